//! Command execution: assemble the engine, pump it, talk to the operator.

use crate::cli::{Cli, Commands};
use eyre::{Result, WrapErr};
use fence_core::{
    Calibration, CalibrationStore, Controller, ItemStatus, Length, StateKind, UnitMode,
    parse_length,
};
use fence_hardware::SimulatedDriver;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub fn dispatch(args: &Cli, cfg: &fence_config::Config, estop: Arc<AtomicBool>) -> Result<()> {
    let mut controller = build_controller(args, cfg, estop)?;
    let poll = Duration::from_millis(cfg.motion.poll_ms);
    let display: fence_core::DisplayCfg = (&cfg.display).into();

    match &args.cmd {
        Commands::Cut {
            lengths,
            unit,
            auto_confirm,
        } => {
            let mode = (*unit).map_or(display.unit_mode, Into::into);
            for text in lengths {
                let id = controller.submit_length_as(text, mode)?;
                tracing::debug!(item = %id, text, "queued from CLI");
            }
            let auto = *auto_confirm;
            pump(&mut controller, poll, |c| {
                let snap = c.snapshot();
                if let Some(item) = snap
                    .queue
                    .iter()
                    .find(|i| i.status == ItemStatus::AwaitingCut)
                {
                    println!(
                        "Positioned at {} for {} ({}); make the cut.",
                        snap.position_display, item.target, item.id
                    );
                }
                if !auto {
                    wait_for_enter()?;
                }
                c.confirm_cut()
            })?;
            println!("All cuts done.");
        }
        Commands::Home => {
            controller.request_home();
            pump(&mut controller, poll, no_confirm)?;
            println!("Homed at {}.", controller.snapshot().position_display);
        }
        Commands::Park => {
            ensure_homed(&mut controller, poll)?;
            controller.request_park()?;
            pump(&mut controller, poll, no_confirm)?;
            println!("Parked at {}.", controller.snapshot().position_display);
        }
        Commands::Jog { by } => {
            ensure_homed(&mut controller, poll)?;
            let delta = parse_signed(by, display.unit_mode, display.max_length)?;
            controller.request_jog(delta)?;
            pump(&mut controller, poll, no_confirm)?;
            println!("Now at {}.", controller.snapshot().position_display);
        }
        Commands::Calibrate { travel, observed } => {
            ensure_homed(&mut controller, poll)?;
            let target = parse_length(travel, display.unit_mode, display.max_length)
                .wrap_err("parsing --travel")?;
            controller.request_move_to(target)?;
            pump(&mut controller, poll, no_confirm)?;
            let measured = parse_length(observed, display.unit_mode, display.max_length)
                .wrap_err("parsing --observed")?;
            let updated = controller.request_calibration_run(measured)?;
            println!(
                "Calibration updated: {:.3} steps/mm.",
                updated.steps_per_unit.as_steps_per_mm()
            );
        }
        Commands::Status => {
            print_status(&controller, args.json)?;
        }
    }
    Ok(())
}

fn build_controller(
    args: &Cli,
    cfg: &fence_config::Config,
    estop: Arc<AtomicBool>,
) -> Result<Controller> {
    let driver = SimulatedDriver::with_time_scale(args.time_scale);
    let store = match &cfg.calibration.file {
        Some(path) => CalibrationStore::open(path, cfg.calibration.tolerance),
        None => CalibrationStore::volatile(Calibration::safe_default(), cfg.calibration.tolerance),
    };
    Controller::builder()
        .with_driver(driver)
        .with_store(store)
        .with_motion((&cfg.motion).into())
        .with_display((&cfg.display).into())
        .with_estop_debounce(cfg.estop.debounce_n)
        .with_estop_check(move || estop.load(Ordering::Relaxed))
        .build()
}

/// Pump the controller until it goes idle with nothing pending, invoking
/// `on_awaiting` whenever a cut awaits operator confirmation. An `Error`
/// state surfaces as the fault reason.
fn pump(
    controller: &mut Controller,
    poll: Duration,
    mut on_awaiting: impl FnMut(&mut Controller) -> Result<()>,
) -> Result<StateKind> {
    loop {
        let state = controller.tick();
        match state {
            StateKind::AwaitingOperatorConfirm => on_awaiting(controller)?,
            StateKind::Idle => {
                if !controller.queue().has_pending() {
                    return Ok(state);
                }
            }
            StateKind::Error(reason) => return Err(eyre::Report::new(reason)),
            _ => {}
        }
        std::thread::sleep(poll);
    }
}

fn no_confirm(_c: &mut Controller) -> Result<()> {
    Ok(())
}

fn ensure_homed(controller: &mut Controller, poll: Duration) -> Result<()> {
    if controller.is_homed() {
        return Ok(());
    }
    controller.request_home();
    pump(controller, poll, no_confirm)?;
    Ok(())
}

/// Lengths with an optional leading '-'; the grammar itself is unsigned.
fn parse_signed(text: &str, mode: UnitMode, max: Length) -> Result<Length> {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix('-') {
        Ok(-parse_length(rest, mode, max)?)
    } else {
        Ok(parse_length(trimmed, mode, max)?)
    }
}

fn wait_for_enter() -> Result<()> {
    print!("Press Enter when the cut is done... ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn print_status(controller: &Controller, json: bool) -> Result<()> {
    let snap = controller.snapshot();
    if json {
        let queue: Vec<_> = snap
            .queue
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id.to_string(),
                    "requested": i.requested,
                    "target": i.target,
                    "status": format!("{:?}", i.status),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "state": format!("{:?}", snap.state),
                "is_homed": snap.is_homed,
                "position": snap.position_display,
                "queue": queue,
            })
        );
    } else {
        println!("state:    {:?}", snap.state);
        println!("homed:    {}", snap.is_homed);
        println!("position: {}", snap.position_display);
        for item in &snap.queue {
            println!("  {} {} -> {} [{:?}]", item.id, item.requested, item.target, item.status);
        }
    }
    Ok(())
}
