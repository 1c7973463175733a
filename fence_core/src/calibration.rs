//! Calibration model: rational steps-per-unit, backlash, and track limits.

use crate::units::{Length, NM_PER_MM};
use crate::util::{div_round_half_away, gcd_u64};

/// Rational steps-per-unit: `steps` motor steps move the carriage by `span`.
///
/// Kept as a true rational (reduced by gcd) rather than a float so repeated
/// step computations cannot drift; a calibration run yields the ratio
/// `observed steps / observed length` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepsPerUnit {
    steps: u64,
    span_nm: u64,
}

impl StepsPerUnit {
    /// Build from a step count and the length those steps traverse.
    /// Returns `None` unless both are positive.
    pub fn new(steps: u64, span: Length) -> Option<Self> {
        if steps == 0 || span.as_nm() <= 0 {
            return None;
        }
        let span_nm = span.as_nm() as u64;
        let g = gcd_u64(steps, span_nm);
        Some(Self {
            steps: steps / g,
            span_nm: span_nm / g,
        })
    }

    /// Convenience: whole steps per millimetre.
    pub fn per_mm(steps_per_mm: u64) -> Option<Self> {
        Self::new(steps_per_mm, Length::from_mm(1))
    }

    /// Signed step count for a signed travel, rounded half away from zero.
    pub fn steps_for(&self, delta: Length) -> i64 {
        div_round_half_away(
            i128::from(delta.as_nm()) * i128::from(self.steps),
            i128::from(self.span_nm),
        ) as i64
    }

    /// Steps per millimetre as a float; for plausibility checks and display
    /// only, never for step math.
    pub fn as_steps_per_mm(&self) -> f64 {
        (self.steps as f64) * (NM_PER_MM as f64) / (self.span_nm as f64)
    }

    pub fn raw(&self) -> (u64, u64) {
        (self.steps, self.span_nm)
    }
}

/// Device calibration: owned by the calibration store, borrowed read-only by
/// the planner for the duration of one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub steps_per_unit: StepsPerUnit,
    /// Slack taken up on direction reversal, in steps.
    pub backlash_steps: u32,
    pub min_position: Length,
    pub max_position: Length,
    /// Absolute position of the home reference.
    pub home_offset: Length,
}

impl Calibration {
    /// Documented fallback when no usable record exists: 100 steps/mm on a
    /// 1 m track, no backlash, home at zero. Deliberately conservative; a
    /// calibration run is expected before precision work.
    pub fn safe_default() -> Self {
        Self {
            steps_per_unit: StepsPerUnit {
                steps: 1,
                span_nm: 10_000, // 100 steps per mm, pre-reduced
            },
            backlash_steps: 0,
            min_position: Length::ZERO,
            max_position: Length::from_mm(1_000),
            home_offset: Length::ZERO,
        }
    }

    /// Check the record invariants; the message names the violated one.
    pub fn validate(&self) -> Result<(), &'static str> {
        let (steps, span) = self.steps_per_unit.raw();
        if steps == 0 || span == 0 {
            return Err("steps_per_unit must be positive");
        }
        if self.min_position >= self.max_position {
            return Err("min_position must be below max_position");
        }
        if self.home_offset < self.min_position || self.home_offset > self.max_position {
            return Err("home_offset must lie within the track limits");
        }
        Ok(())
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::safe_default()
    }
}
