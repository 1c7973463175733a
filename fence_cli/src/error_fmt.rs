//! Human-readable error descriptions for the operator.

use fence_core::{
    BuildError, CalibrationError, ControlError, FaultReason, ParseError, PlanError, QueueError,
};

/// Map an eyre::Report to a short explanation with likely causes and a fix
/// hint. Typed matches first, generic fallback last.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(pe) = err.downcast_ref::<ParseError>() {
        return match pe {
            ParseError::InvalidFormat(detail) => format!(
                "Invalid length ({detail}).\nEnter a metric decimal like 152.4, or an inch form like 12-3/4, 3/8, or 0.5."
            ),
            ParseError::OutOfRange => {
                "Length exceeds the maximum accepted value.\nCheck display.max_length_mm in the config.".to_string()
            }
        };
    }

    if let Some(pe) = err.downcast_ref::<PlanError>() {
        return match pe {
            PlanError::OutOfBounds => {
                "Target lies outside the calibrated track limits.\nNothing moved; pick a target within the track, or re-check the calibration limits.".to_string()
            }
            PlanError::NotHomed => {
                "The carriage position is not trusted yet.\nRun `fence home` (or reset after a fault) before moving.".to_string()
            }
            PlanError::ZeroOrNegativeCalibration => {
                "The calibration record is unusable; refusing to move blindly.\nRestore or re-create the calibration file, then home again.".to_string()
            }
        };
    }

    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::Implausible { .. } => format!(
                "{ce}.\nThe prior calibration was kept. Re-measure the reference cut and try again, or raise calibration.tolerance if the drive really changed."
            ),
            CalibrationError::NoReferenceMove => {
                "No completed move to calibrate against.\nUse `fence calibrate --travel <len> --observed <len>` so a reference move runs first.".to_string()
            }
            CalibrationError::ZeroObservedLength => {
                "The observed length must be positive.".to_string()
            }
        };
    }

    if let Some(qe) = err.downcast_ref::<QueueError>() {
        return format!("{qe}.");
    }

    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::Faulted => {
                "The controller is in an error state.\nResolve the fault, then reset; a homing cycle runs before work resumes.".to_string()
            }
            other => format!("{other}."),
        };
    }

    if let Some(reason) = err.downcast_ref::<FaultReason>() {
        return match reason {
            FaultReason::HardwareFault => {
                "The driver reported a stall or fault (or never answered) mid-move.\nThe carriage position can no longer be trusted: clear the obstruction, then home and retry. The move is never retried silently.".to_string()
            }
            FaultReason::Cancelled => {
                "Emergency stop.\nThe move was halted immediately; home the carriage before resuming.".to_string()
            }
            FaultReason::OutOfBounds => {
                "A queued target lies outside the calibrated track limits.\nThe item failed without moving; reset, then queue a target within the track.".to_string()
            }
            FaultReason::NotHomed => {
                "A move was attempted before homing.\nReset; a homing cycle runs before work resumes.".to_string()
            }
            FaultReason::InvalidCalibration => {
                "The calibration record is unusable; refusing to move blindly.\nRestore or re-create the calibration file, then reset.".to_string()
            }
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return format!("Engine assembly failed: {be}.");
    }

    format!("{err}")
}
