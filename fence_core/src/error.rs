use thiserror::Error;

/// Operator-input failures from the unit model; recovered locally (reprompt).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid length format: {0}")]
    InvalidFormat(&'static str),
    #[error("length exceeds the maximum accepted value")]
    OutOfRange,
}

/// Planner failures; the affected queue item fails with the same kind.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("target lies outside the track limits")]
    OutOfBounds,
    #[error("carriage is not homed")]
    NotHomed,
    #[error("calibration is zero or negative")]
    ZeroOrNegativeCalibration,
}

/// Calibration persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt calibration record: {0}")]
    Corrupt(String),
    #[error("cannot encode calibration record: {0}")]
    Encode(String),
    #[error("calibration io: {0}")]
    Io(#[from] std::io::Error),
}

/// Calibration-run rejections; the prior calibration is always retained.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    #[error(
        "implausible calibration run: {observed_steps_per_mm:.3} steps/mm deviates more than \
         {tolerance_pct:.0}% from the prior {prior_steps_per_mm:.3} steps/mm"
    )]
    Implausible {
        prior_steps_per_mm: f64,
        observed_steps_per_mm: f64,
        tolerance_pct: f64,
    },
    #[error("no completed move to calibrate against")]
    NoReferenceMove,
    #[error("observed length must be positive")]
    ZeroObservedLength,
}

/// Queue command rejections, surfaced to the operator as-is.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("cannot cancel the active item; stop the move first")]
    CannotCancelActive,
    #[error("cannot reorder the active item")]
    CannotReorderActive,
    #[error("item already finished")]
    AlreadyFinished,
    #[error("unknown queue item")]
    UnknownItem,
}

/// Controller command rejections (wrong state for the request).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    #[error("carriage must be homed first")]
    NotHomed,
    #[error("controller is busy")]
    Busy,
    #[error("controller is faulted; reset required")]
    Faulted,
    #[error("controller is not in an error state")]
    NotFaulted,
    #[error("no cut is awaiting confirmation")]
    NothingToConfirm,
}

/// Why a queue item failed or the controller entered `Error`.
///
/// Timeouts are reported as `HardwareFault`: a move that never signals
/// completion is indistinguishable from a stall without an encoder.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultReason {
    #[error("target out of bounds")]
    OutOfBounds,
    #[error("not homed")]
    NotHomed,
    #[error("invalid calibration")]
    InvalidCalibration,
    #[error("hardware fault")]
    HardwareFault,
    #[error("cancelled")]
    Cancelled,
}

impl From<PlanError> for FaultReason {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::OutOfBounds => FaultReason::OutOfBounds,
            PlanError::NotHomed => FaultReason::NotHomed,
            PlanError::ZeroOrNegativeCalibration => FaultReason::InvalidCalibration,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motion driver")]
    MissingDriver,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
