//! Threaded simulated motion driver.
//!
//! Executes one command at a time on a worker thread that paces itself with
//! the command's velocity profile (optionally scaled for fast tests/demos),
//! reports the terminal status over a bounded channel, and honors an atomic
//! halt flag between step chunks. Tracks an absolute step counter so tests
//! can observe how far the "carriage" actually travelled, and supports
//! scripted stalls and faults.
//!
//! Safety: each command spawns exactly one worker, joined when the next
//! command is issued or the driver is dropped, so threads never leak.

use crate::error::HwError;
use crossbeam_channel as xch;
use fence_traits::{DriveStatus, DriverError, MotionDriver, MoveCommand, MoveHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

/// Steps executed between halt-flag checks.
const CHUNK_STEPS: u32 = 64;
/// Pulse rate used when a command carries no profile information.
const FALLBACK_SPS: u32 = 1000;
/// Simulated homing seek rate.
const HOMING_SPS: u32 = 2000;

struct ActiveMove {
    handle: u64,
    rx: xch::Receiver<DriveStatus>,
    halt: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
    done: Option<DriveStatus>,
}

/// In-memory stand-in for a real step/dir driver.
pub struct SimulatedDriver {
    /// Wall-clock divisor: 1 = real time, 1000 = thousandfold speed-up.
    time_scale: u32,
    next_handle: u64,
    active: Option<ActiveMove>,
    position_steps: Arc<AtomicI64>,
    stall_at_step: Option<u32>,
    fail_next: bool,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// Real-time driver.
    pub fn new() -> Self {
        Self::with_time_scale(1)
    }

    /// Driver running `time_scale` times faster than real time.
    pub fn with_time_scale(time_scale: u32) -> Self {
        Self {
            time_scale: time_scale.max(1),
            next_handle: 0,
            active: None,
            position_steps: Arc::new(AtomicI64::new(0)),
            stall_at_step: None,
            fail_next: false,
        }
    }

    /// Inject a stall after this many steps of the next command.
    pub fn stall_at_step(&mut self, step: u32) -> &mut Self {
        self.stall_at_step = Some(step);
        self
    }

    /// Make the next command fault immediately.
    pub fn fail_next(&mut self) -> &mut Self {
        self.fail_next = true;
        self
    }

    /// Absolute simulated position in steps (forward-positive).
    pub fn position_steps(&self) -> i64 {
        self.position_steps.load(Ordering::Relaxed)
    }

    /// Shared view of the step counter, e.g. for assertions after drop.
    pub fn position_counter(&self) -> Arc<AtomicI64> {
        self.position_steps.clone()
    }

    fn check_idle(&mut self) -> Result<(), HwError> {
        let busy = match &mut self.active {
            None => false,
            Some(active) => {
                if active.done.is_some() {
                    false
                } else {
                    match active.rx.try_recv() {
                        Ok(status) => {
                            active.done = Some(status);
                            false
                        }
                        // Worker exited without a status (halted).
                        Err(xch::TryRecvError::Disconnected) => false,
                        Err(xch::TryRecvError::Empty) => true,
                    }
                }
            }
        };
        if busy {
            return Err(HwError::Busy);
        }
        // Join the previous worker before starting the next one.
        if let Some(mut prev) = self.active.take()
            && let Some(handle) = prev.join.take()
            && handle.join().is_err()
        {
            tracing::warn!("previous worker thread panicked");
        }
        Ok(())
    }

    fn spawn(&mut self, job: Job) -> MoveHandle {
        self.next_handle += 1;
        let handle = self.next_handle;
        let (tx, rx) = xch::bounded(1);
        let halt = Arc::new(AtomicBool::new(false));
        let halt_worker = halt.clone();
        let position = self.position_steps.clone();
        let time_scale = self.time_scale;

        let join = std::thread::spawn(move || run_job(job, halt_worker, tx, position, time_scale));

        self.active = Some(ActiveMove {
            handle,
            rx,
            halt,
            join: Some(join),
            done: None,
        });
        MoveHandle(handle)
    }
}

enum Job {
    Move {
        cmd: MoveCommand,
        stall_at_step: Option<u32>,
    },
    FaultImmediately,
    SeekHome,
}

fn run_job(
    job: Job,
    halt: Arc<AtomicBool>,
    tx: xch::Sender<DriveStatus>,
    position: Arc<AtomicI64>,
    time_scale: u32,
) {
    let status = match job {
        Job::FaultImmediately => DriveStatus::Faulted,
        Job::Move { cmd, stall_at_step } => {
            let sign = cmd.direction.sign();
            pulse(
                cmd.steps,
                sign,
                |step| cmd.profile.rate_at(step).max(1),
                stall_at_step,
                &halt,
                &position,
                time_scale,
            )
        }
        Job::SeekHome => {
            // Drive back toward the reference, then latch the counter to 0
            // exactly, the way a home switch re-establishes position.
            let pos = position.load(Ordering::Relaxed);
            let steps = pos.unsigned_abs().min(u64::from(u32::MAX)) as u32;
            let sign = if pos > 0 { -1 } else { 1 };
            let status = pulse(
                steps,
                sign,
                |_| HOMING_SPS,
                None,
                &halt,
                &position,
                time_scale,
            );
            if status == DriveStatus::Completed {
                position.store(0, Ordering::Relaxed);
            }
            status
        }
    };
    if halt.load(Ordering::Relaxed) {
        tracing::debug!("worker halted; discarding terminal status");
        return;
    }
    // If send fails the consumer is gone; nothing left to report.
    let _ = tx.send(status);
}

/// Step through a move in chunks, honoring the halt flag between chunks.
/// Returns the terminal status (Completed, or Stalled at the injected step).
fn pulse(
    steps: u32,
    sign: i64,
    rate_at: impl Fn(u32) -> u32,
    stall_at_step: Option<u32>,
    halt: &AtomicBool,
    position: &AtomicI64,
    time_scale: u32,
) -> DriveStatus {
    let mut issued: u32 = 0;
    while issued < steps {
        if halt.load(Ordering::Relaxed) {
            return DriveStatus::Completed; // discarded by the caller
        }
        if let Some(stall) = stall_at_step
            && issued >= stall
        {
            tracing::debug!(issued, "injected stall");
            return DriveStatus::Stalled;
        }
        let mut chunk_end = issued.saturating_add(CHUNK_STEPS).min(steps);
        if let Some(stall) = stall_at_step {
            chunk_end = chunk_end.min(stall.max(issued + 1));
        }
        let chunk = chunk_end - issued;
        let rate = rate_at(issued).max(1);
        let ns = u64::from(chunk) * 1_000_000_000 / u64::from(rate) / u64::from(time_scale.max(1));
        std::thread::sleep(Duration::from_nanos(ns));
        position.fetch_add(sign * i64::from(chunk), Ordering::Relaxed);
        issued = chunk_end;
    }
    DriveStatus::Completed
}

impl MotionDriver for SimulatedDriver {
    fn execute(&mut self, cmd: &MoveCommand) -> Result<MoveHandle, DriverError> {
        self.check_idle()?;
        let job = if std::mem::take(&mut self.fail_next) {
            Job::FaultImmediately
        } else {
            Job::Move {
                cmd: cmd.clone(),
                stall_at_step: self.stall_at_step.take(),
            }
        };
        tracing::debug!(steps = cmd.steps, direction = ?cmd.direction, "sim execute");
        Ok(self.spawn(job))
    }

    fn seek_home(&mut self) -> Result<MoveHandle, DriverError> {
        self.check_idle()?;
        tracing::debug!("sim homing seek");
        Ok(self.spawn(Job::SeekHome))
    }

    fn poll(&mut self, handle: MoveHandle) -> Result<DriveStatus, DriverError> {
        let active = self
            .active
            .as_mut()
            .filter(|a| a.handle == handle.0)
            .ok_or(HwError::UnknownHandle(handle.0))?;
        if let Some(done) = active.done {
            return Ok(done);
        }
        match active.rx.try_recv() {
            Ok(status) => {
                active.done = Some(status);
                Ok(status)
            }
            Err(_) => Ok(DriveStatus::Pending),
        }
    }

    fn halt(&mut self, handle: MoveHandle) -> Result<(), DriverError> {
        let active = self
            .active
            .as_ref()
            .filter(|a| a.handle == handle.0)
            .ok_or(HwError::UnknownHandle(handle.0))?;
        active.halt.store(true, Ordering::Relaxed);
        tracing::debug!(handle = handle.0, "sim halt");
        Ok(())
    }
}

impl Drop for SimulatedDriver {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.halt.store(true, Ordering::Relaxed);
            if let Some(handle) = active.join.take()
                && handle.join().is_err()
            {
                tracing::warn!("worker thread panicked during shutdown");
            }
        }
    }
}
