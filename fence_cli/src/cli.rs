//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "fence", version, about = "Saw-fence positioning CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/fence.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Simulated driver speed-up factor (1 = real time)
    #[arg(long, value_name = "FACTOR", default_value_t = 1000)]
    pub time_scale: u32,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Unit mode override for entered lengths.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum UnitArg {
    Inch,
    Metric,
}

impl From<UnitArg> for fence_core::UnitMode {
    fn from(u: UnitArg) -> Self {
        match u {
            UnitArg::Inch => fence_core::UnitMode::Inch,
            UnitArg::Metric => fence_core::UnitMode::Metric,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue cut lengths and run them to completion
    Cut {
        /// Lengths in the configured unit mode, e.g. "12-3/4" or "152.4"
        #[arg(required = true)]
        lengths: Vec<String>,
        /// Override the unit mode for these lengths
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        /// Confirm each cut automatically instead of prompting
        #[arg(long, action = ArgAction::SetTrue)]
        auto_confirm: bool,
    },
    /// Home the carriage
    Home,
    /// Park the carriage at the far track limit
    Park,
    /// Jog the carriage by a signed distance (prefix with '-' to jog toward home)
    Jog {
        /// Distance, e.g. "1/16" or "-0.5"
        by: String,
    },
    /// Run a reference move, then recompute steps-per-unit from the measured travel
    Calibrate {
        /// Commanded target position for the reference move
        #[arg(long, value_name = "LENGTH")]
        travel: String,
        /// Measured actual travel
        #[arg(long, value_name = "LENGTH")]
        observed: String,
    },
    /// Print a status snapshot
    Status,
}
