//! Runtime configuration structs for the fence engine.
//!
//! These are the validated, canonical-unit counterparts of the TOML-facing
//! types in `fence_config`; see `conversions` for the mapping.

use crate::units::{Length, UnitMode};

/// Motion planning and supervision knobs.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Distance over which moves ramp up (and symmetrically down).
    pub acceleration_distance: Length,
    /// Cruise pulse rate (steps per second).
    pub max_velocity_sps: u32,
    /// Pulse rate at the start/end of a ramp (steps per second).
    pub start_velocity_sps: u32,
    /// A move is failed as a hardware fault when no terminal status arrives
    /// within `estimated duration x this multiplier`.
    pub move_timeout_multiplier: f64,
    /// Hard cap on a homing seek in milliseconds.
    pub homing_timeout_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            acceleration_distance: Length::from_mm(10),
            max_velocity_sps: 2000,
            start_velocity_sps: 200,
            move_timeout_multiplier: 3.0,
            homing_timeout_ms: 30_000,
        }
    }
}

/// How operator-facing lengths are parsed and rendered.
#[derive(Debug, Clone)]
pub struct DisplayCfg {
    /// Default unit mode for entered lengths.
    pub unit_mode: UnitMode,
    /// Fraction rounding granularity in inch mode (4, 8, 16, 32 or 64).
    pub fraction_denominator: u32,
    /// Decimal places shown in metric mode (0..=6).
    pub metric_decimals: u8,
    /// Largest length accepted from the operator.
    pub max_length: Length,
}

impl DisplayCfg {
    /// Precision argument for `format_length` in the configured mode.
    pub fn precision(&self) -> u32 {
        match self.unit_mode {
            UnitMode::Inch => self.fraction_denominator,
            UnitMode::Metric => u32::from(self.metric_decimals),
        }
    }
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            unit_mode: UnitMode::Inch,
            fraction_denominator: 16,
            metric_decimals: 2,
            max_length: Length::from_mm(10_000),
        }
    }
}
