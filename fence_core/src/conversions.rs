//! `From`/`TryFrom` implementations bridging `fence_config` types to
//! `fence_core` types, so the CLI never maps fields by hand.

use crate::calibration::{Calibration, StepsPerUnit};
use crate::config::{DisplayCfg, MotionCfg};
use crate::units::{Length, NM_PER_MM, UnitMode};

// ── UnitMode ─────────────────────────────────────────────────────────────────

impl From<fence_config::UnitMode> for UnitMode {
    fn from(m: fence_config::UnitMode) -> Self {
        match m {
            fence_config::UnitMode::Inch => UnitMode::Inch,
            fence_config::UnitMode::Metric => UnitMode::Metric,
        }
    }
}

// ── DisplayCfg ───────────────────────────────────────────────────────────────

impl From<&fence_config::Display> for DisplayCfg {
    fn from(c: &fence_config::Display) -> Self {
        Self {
            unit_mode: c.unit_mode.into(),
            fraction_denominator: c.fraction_denominator,
            metric_decimals: c.metric_decimals,
            max_length: Length::from_mm(c.max_length_mm as i64),
        }
    }
}

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&fence_config::Motion> for MotionCfg {
    fn from(c: &fence_config::Motion) -> Self {
        // Config-boundary float; rounded once to canonical units here.
        let accel_nm = (c.acceleration_distance_mm * NM_PER_MM as f64).round() as i64;
        Self {
            acceleration_distance: Length::from_nm(accel_nm.max(1)),
            max_velocity_sps: c.max_velocity_sps,
            start_velocity_sps: c.start_velocity_sps,
            move_timeout_multiplier: c.move_timeout_multiplier,
            homing_timeout_ms: c.homing_timeout_ms,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl TryFrom<&fence_config::CalibrationFile> for Calibration {
    type Error = &'static str;

    fn try_from(f: &fence_config::CalibrationFile) -> Result<Self, Self::Error> {
        let steps_per_unit = StepsPerUnit::new(
            f.steps_per_unit.steps,
            Length::from_nm(i64::try_from(f.steps_per_unit.span_nm).map_err(|_| {
                "steps_per_unit.span_nm out of range"
            })?),
        )
        .ok_or("steps_per_unit must be positive")?;
        let cal = Calibration {
            steps_per_unit,
            backlash_steps: f.backlash_steps,
            min_position: Length::from_nm(f.min_position_nm),
            max_position: Length::from_nm(f.max_position_nm),
            home_offset: Length::from_nm(f.home_offset_nm),
        };
        cal.validate()?;
        Ok(cal)
    }
}

impl From<&Calibration> for fence_config::CalibrationFile {
    fn from(c: &Calibration) -> Self {
        let (steps, span_nm) = c.steps_per_unit.raw();
        Self {
            schema_version: fence_config::CALIBRATION_SCHEMA_VERSION,
            steps_per_unit: fence_config::StepsPerUnitFile { steps, span_nm },
            backlash_steps: c.backlash_steps,
            min_position_nm: c.min_position.as_nm(),
            max_position_nm: c.max_position.as_nm(),
            home_offset_nm: c.home_offset.as_nm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_file_round_trips() {
        let cal = Calibration::safe_default();
        let file = fence_config::CalibrationFile::from(&cal);
        let back = Calibration::try_from(&file).unwrap();
        assert_eq!(back, cal);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = fence_config::CalibrationFile::default();
        file.steps_per_unit.steps = 0;
        assert!(Calibration::try_from(&file).is_err());

        let mut file = fence_config::CalibrationFile::default();
        file.max_position_nm = file.min_position_nm;
        assert!(Calibration::try_from(&file).is_err());
    }
}
