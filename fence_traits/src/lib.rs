//! Boundary vocabulary between the fence engine and motor-driver backends.
//!
//! The engine plans moves; a `MotionDriver` executes them. Drivers are
//! long-running relative to control logic, so the contract is non-blocking:
//! `execute` returns a handle immediately and the caller polls for the
//! terminal status, with `halt` available as an immediate stop primitive.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Errors crossing the driver boundary. Implementations carry their own typed
/// errors; the engine maps these back to its taxonomy.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Direction of travel along the track.
///
/// `Forward` moves the carriage away from the home reference (increasing
/// position), `Reverse` toward it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// The opposite direction.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Sign multiplier for step accounting.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

/// Opaque token identifying one issued command for `poll`/`halt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveHandle(pub u64);

/// One breakpoint of a velocity profile: from `start_step` onward, pulse at
/// `steps_per_sec` until the next breakpoint (or the end of the move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSegment {
    pub start_step: u32,
    pub steps_per_sec: u32,
}

/// Ordered velocity breakpoints covering a whole move.
///
/// Segments are sorted by `start_step`, the first one starting at step 0.
/// An empty profile belongs to a zero-step command only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VelocityProfile {
    pub segments: Vec<ProfileSegment>,
}

impl VelocityProfile {
    /// Single-rate profile covering the whole move.
    pub fn flat(steps_per_sec: u32) -> Self {
        Self {
            segments: vec![ProfileSegment {
                start_step: 0,
                steps_per_sec: steps_per_sec.max(1),
            }],
        }
    }

    /// Commanded rate at a given step index (0 for an empty profile).
    pub fn rate_at(&self, step: u32) -> u32 {
        let mut rate = 0;
        for seg in &self.segments {
            if seg.start_step <= step {
                rate = seg.steps_per_sec;
            } else {
                break;
            }
        }
        rate
    }

    /// Estimated wall-clock duration for `total_steps` steps, in milliseconds.
    ///
    /// Sums per-segment spans at each segment's rate. Drivers may coalesce
    /// sub-millisecond jitter, so this is an estimate, not a guarantee.
    pub fn duration_ms(&self, total_steps: u32) -> u64 {
        let mut ms: u64 = 0;
        for (i, seg) in self.segments.iter().enumerate() {
            let end = self
                .segments
                .get(i + 1)
                .map_or(total_steps, |next| next.start_step.min(total_steps));
            let span = end.saturating_sub(seg.start_step) as u64;
            let sps = u64::from(seg.steps_per_sec.max(1));
            ms = ms.saturating_add(span.saturating_mul(1000).div_ceil(sps));
        }
        ms
    }
}

/// An immutable step command, produced once per move and consumed once by a
/// driver. `steps == 0` is a valid no-op that drivers must complete
/// immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub direction: Direction,
    pub steps: u32,
    pub profile: VelocityProfile,
}

impl MoveCommand {
    /// Zero-step command; completes without motion.
    pub fn no_op() -> Self {
        Self {
            direction: Direction::Forward,
            steps: 0,
            profile: VelocityProfile::default(),
        }
    }

    #[inline]
    pub fn is_no_op(&self) -> bool {
        self.steps == 0
    }

    /// Estimated duration of this command in milliseconds.
    pub fn estimated_duration_ms(&self) -> u64 {
        self.profile.duration_ms(self.steps)
    }
}

/// Observed status of an issued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStatus {
    /// Still pulsing.
    Pending,
    /// All commanded steps issued.
    Completed,
    /// Motion stopped against resistance before completing.
    Stalled,
    /// Driver-internal failure; remaining step count unknown.
    Faulted,
}

/// A motor driver executing step commands.
///
/// One command at a time: callers must observe a terminal status (or halt)
/// before issuing the next command. `halt` stops pulsing immediately
/// regardless of remaining steps; after a halt the true carriage position is
/// unknown to the driver.
pub trait MotionDriver {
    /// Begin executing a command; returns immediately with a handle.
    fn execute(&mut self, cmd: &MoveCommand) -> Result<MoveHandle, DriverError>;

    /// Drive toward the home reference; completes when the reference is
    /// reached. Same handle/poll lifecycle as `execute`.
    fn seek_home(&mut self) -> Result<MoveHandle, DriverError>;

    /// Observe the current status of an issued command.
    fn poll(&mut self, handle: MoveHandle) -> Result<DriveStatus, DriverError>;

    /// Stop pulsing immediately, regardless of remaining step count.
    fn halt(&mut self, handle: MoveHandle) -> Result<(), DriverError>;
}

/// Shared-ownership driver: lets a test (or a composite rig) keep a handle
/// to a driver after lending it to a single-threaded controller.
impl<D: MotionDriver> MotionDriver for std::rc::Rc<std::cell::RefCell<D>> {
    fn execute(&mut self, cmd: &MoveCommand) -> Result<MoveHandle, DriverError> {
        self.borrow_mut().execute(cmd)
    }
    fn seek_home(&mut self) -> Result<MoveHandle, DriverError> {
        self.borrow_mut().seek_home()
    }
    fn poll(&mut self, handle: MoveHandle) -> Result<DriveStatus, DriverError> {
        self.borrow_mut().poll(handle)
    }
    fn halt(&mut self, handle: MoveHandle) -> Result<(), DriverError> {
        self.borrow_mut().halt(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_at_picks_last_started_segment() {
        let p = VelocityProfile {
            segments: vec![
                ProfileSegment {
                    start_step: 0,
                    steps_per_sec: 100,
                },
                ProfileSegment {
                    start_step: 10,
                    steps_per_sec: 400,
                },
            ],
        };
        assert_eq!(p.rate_at(0), 100);
        assert_eq!(p.rate_at(9), 100);
        assert_eq!(p.rate_at(10), 400);
        assert_eq!(p.rate_at(1000), 400);
    }

    #[test]
    fn duration_sums_segment_spans() {
        // 10 steps at 100 sps = 100 ms, then 90 steps at 900 sps = 100 ms.
        let p = VelocityProfile {
            segments: vec![
                ProfileSegment {
                    start_step: 0,
                    steps_per_sec: 100,
                },
                ProfileSegment {
                    start_step: 10,
                    steps_per_sec: 900,
                },
            ],
        };
        assert_eq!(p.duration_ms(100), 200);
    }

    #[test]
    fn no_op_has_zero_duration() {
        let cmd = MoveCommand::no_op();
        assert!(cmd.is_no_op());
        assert_eq!(cmd.estimated_duration_ms(), 0);
    }
}
