mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, FILE_GUARD};
use eyre::Result;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let (cfg, cfg_missing) = load_config(&args.config);
    init_logging(&args, &cfg);
    if cfg_missing {
        tracing::warn!(path = %args.config.display(), "config file not found; using defaults");
    }
    cfg.validate()?;

    // Ctrl-C is the emergency-stop side channel: the controller polls this
    // flag every tick and halts the driver immediately.
    let estop = Arc::new(AtomicBool::new(false));
    {
        let estop = estop.clone();
        ctrlc::set_handler(move || {
            estop.store(true, Ordering::Relaxed);
        })?;
    }

    if let Err(err) = run::dispatch(&args, &cfg, estop) {
        tracing::error!(error = %err, "command failed");
        eprintln!("{}", error_fmt::humanize(&err));
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: &Path) -> (fence_config::Config, bool) {
    match std::fs::read_to_string(path) {
        Ok(text) => match fence_config::load_toml(&text) {
            Ok(cfg) => (cfg, false),
            Err(e) => {
                eprintln!("invalid config {}: {e}", path.display());
                std::process::exit(2);
            }
        },
        Err(_) => (fence_config::Config::default(), true),
    }
}

fn init_logging(args: &Cli, cfg: &fence_config::Config) {
    let level = cfg
        .logging
        .level
        .clone()
        .unwrap_or_else(|| args.log_level.clone());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if let Some(file) = &cfg.logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "fence.log".into(), |n| n.to_string_lossy().into_owned());
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
            dir, name,
        ));
        let _ = FILE_GUARD.set(guard);
        if args.json {
            builder.json().with_writer(writer).init();
        } else {
            builder.with_ansi(false).with_writer(writer).init();
        }
    } else if args.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
