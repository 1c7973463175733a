#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and the persisted calibration record for the fence system.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Unknown keys are ignored; missing sections fall back to documented
//!   defaults so a partial (or absent) config file still yields a runnable
//!   system.
//! - `CalibrationFile` is the on-disk calibration record with a schema
//!   version marker; missing fields default safely for forward compatibility.

use serde::{Deserialize, Serialize};

/// Current calibration record schema version.
pub const CALIBRATION_SCHEMA_VERSION: u32 = 1;

/// Display unit mode for operator-entered and operator-shown lengths.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    #[default]
    Inch,
    Metric,
}

/// How lengths are entered and shown; does not affect internal units.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Display {
    /// Default unit mode for entered lengths.
    pub unit_mode: UnitMode,
    /// Fraction rounding granularity in inch mode; one of 4, 8, 16, 32, 64.
    pub fraction_denominator: u32,
    /// Decimal places shown in metric mode (0..=6).
    pub metric_decimals: u8,
    /// Largest length accepted from the operator, in millimetres.
    pub max_length_mm: u64,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            unit_mode: UnitMode::Inch,
            fraction_denominator: 16,
            metric_decimals: 2,
            max_length_mm: 10_000,
        }
    }
}

/// Motion planning and pacing knobs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Motion {
    /// Distance over which moves ramp up (and symmetrically down), in mm.
    pub acceleration_distance_mm: f64,
    /// Cruise pulse rate (steps per second).
    pub max_velocity_sps: u32,
    /// Pulse rate at the start/end of a ramp (steps per second).
    pub start_velocity_sps: u32,
    /// A move is failed as a hardware fault when no terminal status arrives
    /// within `estimated duration x this multiplier`.
    pub move_timeout_multiplier: f64,
    /// Hard cap on a homing seek in milliseconds.
    pub homing_timeout_ms: u64,
    /// Controller pump period in milliseconds.
    pub poll_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            acceleration_distance_mm: 10.0,
            max_velocity_sps: 2000,
            start_velocity_sps: 200,
            move_timeout_multiplier: 3.0,
            homing_timeout_ms: 30_000,
            poll_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

/// Emergency-stop input handling.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EstopCfg {
    /// Number of consecutive polls required to latch the E-stop.
    pub debounce_n: u8,
}

impl Default for EstopCfg {
    fn default() -> Self {
        Self { debounce_n: 2 }
    }
}

/// Where the calibration record lives and how suspicious to be of new runs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Path of the persisted calibration TOML. When absent the system runs
    /// on safe defaults and calibration runs are not persisted.
    pub file: Option<String>,
    /// Reject a calibration run whose steps-per-unit deviates from the prior
    /// value by more than this fraction (0.0..1.0).
    pub tolerance: f64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            file: None,
            tolerance: 0.20,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub display: Display,
    pub motion: Motion,
    pub logging: Logging,
    pub estop: EstopCfg,
    pub calibration: CalibrationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Display
        if ![4, 8, 16, 32, 64].contains(&self.display.fraction_denominator) {
            eyre::bail!("display.fraction_denominator must be one of 4, 8, 16, 32, 64");
        }
        if self.display.metric_decimals > 6 {
            eyre::bail!("display.metric_decimals must be <= 6");
        }
        if self.display.max_length_mm == 0 {
            eyre::bail!("display.max_length_mm must be >= 1");
        }

        // Motion
        if !(self.motion.acceleration_distance_mm.is_finite()
            && self.motion.acceleration_distance_mm > 0.0)
        {
            eyre::bail!("motion.acceleration_distance_mm must be > 0");
        }
        if self.motion.max_velocity_sps == 0 {
            eyre::bail!("motion.max_velocity_sps must be > 0");
        }
        if self.motion.start_velocity_sps == 0 {
            eyre::bail!("motion.start_velocity_sps must be > 0");
        }
        if self.motion.start_velocity_sps > self.motion.max_velocity_sps {
            eyre::bail!("motion.start_velocity_sps must not exceed max_velocity_sps");
        }
        if !(self.motion.move_timeout_multiplier.is_finite()
            && self.motion.move_timeout_multiplier >= 1.0)
        {
            eyre::bail!("motion.move_timeout_multiplier must be >= 1.0");
        }
        if self.motion.homing_timeout_ms == 0 {
            eyre::bail!("motion.homing_timeout_ms must be >= 1");
        }
        if self.motion.poll_ms == 0 {
            eyre::bail!("motion.poll_ms must be >= 1");
        }

        // E-stop
        if self.estop.debounce_n == 0 {
            eyre::bail!("estop.debounce_n must be >= 1");
        }

        // Calibration
        if !(self.calibration.tolerance.is_finite()
            && self.calibration.tolerance > 0.0
            && self.calibration.tolerance < 1.0)
        {
            eyre::bail!("calibration.tolerance must be in (0.0, 1.0)");
        }

        Ok(())
    }
}

/// Rational steps-per-unit as persisted: `steps` motor steps move the
/// carriage by `span_nm` nanometres.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct StepsPerUnitFile {
    pub steps: u64,
    pub span_nm: u64,
}

/// Persisted calibration record.
///
/// Positions are nanometres so every value survives a round trip exactly.
/// Unknown fields are ignored on load; missing fields take these defaults,
/// which describe an uncalibrated 1 m track at 100 steps/mm.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CalibrationFile {
    pub schema_version: u32,
    pub steps_per_unit: StepsPerUnitFile,
    pub backlash_steps: u32,
    pub min_position_nm: i64,
    pub max_position_nm: i64,
    pub home_offset_nm: i64,
}

impl Default for CalibrationFile {
    fn default() -> Self {
        Self {
            schema_version: CALIBRATION_SCHEMA_VERSION,
            steps_per_unit: StepsPerUnitFile {
                steps: 100,
                span_nm: 1_000_000, // 100 steps per mm
            },
            backlash_steps: 0,
            min_position_nm: 0,
            max_position_nm: 1_000_000_000, // 1 m
            home_offset_nm: 0,
        }
    }
}

pub fn load_calibration_toml(s: &str) -> Result<CalibrationFile, toml::de::Error> {
    toml::from_str::<CalibrationFile>(s)
}
