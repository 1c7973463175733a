//! Test and demo mocks for the motion-driver boundary.

use fence_traits::{DriveStatus, DriverError, MotionDriver, MoveCommand, MoveHandle};
use std::collections::{HashMap, VecDeque};

/// Scripted outcome for one issued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Report `Pending` for this many polls, then `Completed`.
    CompleteAfter(u32),
    /// Report `Pending` for this many polls, then `Stalled`.
    StallAfter(u32),
    /// Report `Pending` for this many polls, then `Faulted`.
    FaultAfter(u32),
    /// Report `Pending` forever (exercise timeouts).
    NeverComplete,
}

/// Deterministic in-memory driver.
///
/// Each `execute`/`seek_home` consumes the next queued [`Script`]
/// (defaulting to immediate completion) and records what was commanded, so
/// tests can assert on dispatched step counts, directions, and halts.
pub struct ScriptedDriver {
    scripts: VecDeque<Script>,
    active: HashMap<u64, (Script, u32)>,
    next_handle: u64,
    /// Commands dispatched via `execute`, in order.
    pub executed: Vec<MoveCommand>,
    /// Number of homing seeks issued.
    pub home_seeks: u32,
    /// Handles halted via `halt`, in order.
    pub halted: Vec<MoveHandle>,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            scripts: VecDeque::new(),
            active: HashMap::new(),
            next_handle: 0,
            executed: Vec::new(),
            home_seeks: 0,
            halted: Vec::new(),
        }
    }

    /// Queue the outcome for the next issued command.
    pub fn push_script(&mut self, script: Script) -> &mut Self {
        self.scripts.push_back(script);
        self
    }

    fn issue(&mut self) -> MoveHandle {
        let script = self.scripts.pop_front().unwrap_or(Script::CompleteAfter(0));
        self.next_handle += 1;
        self.active.insert(self.next_handle, (script, 0));
        MoveHandle(self.next_handle)
    }

    /// The last command dispatched via `execute`.
    pub fn last_command(&self) -> Option<&MoveCommand> {
        self.executed.last()
    }
}

impl MotionDriver for ScriptedDriver {
    fn execute(&mut self, cmd: &MoveCommand) -> Result<MoveHandle, DriverError> {
        self.executed.push(cmd.clone());
        Ok(self.issue())
    }

    fn seek_home(&mut self) -> Result<MoveHandle, DriverError> {
        self.home_seeks += 1;
        Ok(self.issue())
    }

    fn poll(&mut self, handle: MoveHandle) -> Result<DriveStatus, DriverError> {
        let (script, polls) = self
            .active
            .get_mut(&handle.0)
            .ok_or_else(|| -> DriverError { "unknown handle".into() })?;
        let n = *polls;
        *polls += 1;
        Ok(match *script {
            Script::CompleteAfter(k) if n >= k => DriveStatus::Completed,
            Script::StallAfter(k) if n >= k => DriveStatus::Stalled,
            Script::FaultAfter(k) if n >= k => DriveStatus::Faulted,
            _ => DriveStatus::Pending,
        })
    }

    fn halt(&mut self, handle: MoveHandle) -> Result<(), DriverError> {
        self.halted.push(handle);
        Ok(())
    }
}
