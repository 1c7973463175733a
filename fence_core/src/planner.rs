//! Move planning: bounded, backlash-compensated step commands with
//! trapezoidal velocity profiles.
//!
//! The planner is pure: carriage state and calibration in, one immutable
//! [`MoveCommand`] out. It never clamps a target silently: a request
//! outside the track limits is an error, because clamping without reporting
//! would produce a wrong cut.

use crate::calibration::Calibration;
use crate::config::MotionCfg;
use crate::error::PlanError;
use crate::units::Length;
use fence_traits::{Direction, MoveCommand, ProfileSegment, VelocityProfile};

/// Known carriage state; mutated only by the controller after a confirmed
/// driver completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarriageState {
    pub position: Length,
    /// Direction of the last completed move; `None` models power-loss or
    /// uninitialized state and suppresses backlash compensation.
    pub last_direction: Option<Direction>,
    pub is_homed: bool,
}

impl CarriageState {
    /// Power-on state: position untrusted until a homing cycle.
    pub fn unhomed() -> Self {
        Self {
            position: Length::ZERO,
            last_direction: None,
            is_homed: false,
        }
    }

    /// State right after a completed homing cycle.
    pub fn homed_at(position: Length) -> Self {
        Self {
            position,
            last_direction: None,
            is_homed: true,
        }
    }
}

/// Plan a move from `carriage.position` to `target`.
///
/// Fails with [`PlanError::OutOfBounds`] when the target lies outside the
/// calibrated track limits, [`PlanError::NotHomed`] when the carriage
/// position cannot be trusted, and
/// [`PlanError::ZeroOrNegativeCalibration`] if the calibration is invalid
/// despite the store's own checks, in which case the caller must halt
/// rather than move blindly.
///
/// A direction reversal after homing prepends `backlash_steps` to take up
/// mechanical slack; those extra steps are part of the command's step count
/// but not of the productive travel.
pub fn plan(
    carriage: &CarriageState,
    target: Length,
    cal: &Calibration,
    motion: &MotionCfg,
) -> Result<MoveCommand, PlanError> {
    if cal.validate().is_err() {
        return Err(PlanError::ZeroOrNegativeCalibration);
    }
    if !carriage.is_homed {
        return Err(PlanError::NotHomed);
    }
    if target < cal.min_position || target > cal.max_position {
        return Err(PlanError::OutOfBounds);
    }

    let delta = target - carriage.position;
    let steps_signed = cal.steps_per_unit.steps_for(delta);
    if steps_signed == 0 {
        return Ok(MoveCommand::no_op());
    }
    let direction = if steps_signed > 0 {
        Direction::Forward
    } else {
        Direction::Reverse
    };
    let productive: u32 = steps_signed
        .unsigned_abs()
        .try_into()
        .map_err(|_| PlanError::OutOfBounds)?;

    let backlash = match carriage.last_direction {
        Some(prev) if prev != direction => cal.backlash_steps,
        _ => 0,
    };
    let total = productive
        .checked_add(backlash)
        .ok_or(PlanError::OutOfBounds)?;

    let ramp_steps = ramp_steps(cal, motion);
    let profile = build_profile(
        total,
        ramp_steps,
        motion.start_velocity_sps,
        motion.max_velocity_sps,
    );

    Ok(MoveCommand {
        direction,
        steps: total,
        profile,
    })
}

/// Acceleration distance expressed in steps, at least one.
fn ramp_steps(cal: &Calibration, motion: &MotionCfg) -> u32 {
    cal.steps_per_unit
        .steps_for(motion.acceleration_distance)
        .clamp(1, i64::from(u32::MAX)) as u32
}

/// Number of velocity breakpoints per ramp.
const RAMP_BANDS: u32 = 8;

/// Build a trapezoidal profile: ramp up over `ramp_steps`, cruise, ramp down
/// symmetrically. When the move is shorter than two full ramps the profile
/// degenerates to a triangle with a proportionally lower peak, so short
/// moves never command more acceleration than the full ramp would.
pub fn build_profile(
    total_steps: u32,
    ramp_steps: u32,
    start_sps: u32,
    max_sps: u32,
) -> VelocityProfile {
    if total_steps == 0 {
        return VelocityProfile::default();
    }
    let start = start_sps.max(1);
    let max = max_sps.max(start);
    let ramp_steps = ramp_steps.max(1);

    let (ramp, peak) = if u64::from(total_steps) >= 2 * u64::from(ramp_steps) {
        (ramp_steps, max)
    } else {
        // Triangle: half the move accelerating, half decelerating, peak
        // scaled to the fraction of the full ramp actually available.
        let ramp = total_steps / 2;
        let span = u64::from(max - start);
        let peak = start + (span * u64::from(ramp) / u64::from(ramp_steps)) as u32;
        (ramp, peak)
    };

    if ramp == 0 {
        // One- or two-step move: a single crawl segment.
        return VelocityProfile::flat(start);
    }

    let bands = ramp.min(RAMP_BANDS);
    let mut segments = Vec::with_capacity(2 * bands as usize + 1);
    let span = u64::from(peak - start);

    // Ramp up: band i covers [ramp*i/bands, ramp*(i+1)/bands) and ends at
    // its target rate. 64-bit intermediates keep band math overflow-free.
    let band_start = |i: u32| (u64::from(ramp) * u64::from(i) / u64::from(bands)) as u32;
    for i in 0..bands {
        let sps = start + (span * u64::from(i + 1) / u64::from(bands)) as u32;
        push_segment(&mut segments, band_start(i), sps);
    }
    // Cruise (empty for triangles).
    if u64::from(total_steps) > 2 * u64::from(ramp) {
        push_segment(&mut segments, ramp, peak);
    }
    // Ramp down, mirrored.
    let decel_base = total_steps - ramp;
    for i in 0..bands {
        let sps = start + (span * u64::from(bands - 1 - i) / u64::from(bands)) as u32;
        push_segment(&mut segments, decel_base + band_start(i), sps);
    }

    VelocityProfile { segments }
}

/// Append a breakpoint, merging with the previous one when it would repeat
/// the same step index or rate.
fn push_segment(segments: &mut Vec<ProfileSegment>, start_step: u32, steps_per_sec: u32) {
    if let Some(last) = segments.last_mut() {
        if last.start_step == start_step {
            last.steps_per_sec = steps_per_sec;
            return;
        }
        if last.steps_per_sec == steps_per_sec {
            return;
        }
    }
    segments.push(ProfileSegment {
        start_step,
        steps_per_sec,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_ramps_up_cruises_and_ramps_down() {
        let p = build_profile(10_000, 800, 200, 2000);
        assert!(p.segments.len() >= 3);
        assert_eq!(p.segments[0].start_step, 0);
        // Peak rate is reached and held through the cruise phase.
        assert_eq!(p.rate_at(5_000), 2000);
        // End of the ramp-down is back near the start rate.
        let last = p.segments.last().unwrap();
        assert_eq!(last.steps_per_sec, 200);
        // Rates never exceed the cruise rate.
        assert!(p.segments.iter().all(|s| s.steps_per_sec <= 2000));
    }

    #[test]
    fn short_move_is_triangular_with_lower_peak() {
        let p = build_profile(400, 800, 200, 2000);
        // No segment reaches the full cruise rate.
        assert!(p.segments.iter().all(|s| s.steps_per_sec < 2000));
        // Still starts at the start rate band and returns to it.
        assert_eq!(p.segments[0].start_step, 0);
        assert_eq!(p.segments.last().unwrap().steps_per_sec, 200);
    }

    #[test]
    fn tiny_move_is_a_single_crawl_segment() {
        let p = build_profile(1, 800, 200, 2000);
        assert_eq!(
            p.segments,
            vec![ProfileSegment {
                start_step: 0,
                steps_per_sec: 200
            }]
        );
    }

    #[test]
    fn zero_steps_has_empty_profile() {
        assert!(build_profile(0, 800, 200, 2000).segments.is_empty());
    }
}
