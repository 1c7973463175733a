//! Controller state machine: the integration point a front-end drives.
//!
//! One sequential owner of device state. The controller is the only writer
//! of [`CarriageState`] and queue item statuses, which removes any need for
//! locking and prevents races between UI-driven cancellation and in-flight
//! motor completion. Motion is non-blocking: commands are dispatched to the
//! driver and observed via `poll` from [`Controller::tick`], so a front-end
//! stays responsive (status queries, cancel, emergency stop) while the
//! carriage moves.

use crate::calibration::Calibration;
use crate::config::{DisplayCfg, MotionCfg};
use crate::error::{
    BuildError, CalibrationError, ControlError, FaultReason, Result,
};
use crate::planner::{CarriageState, plan};
use crate::queue::{CutQueue, ItemId, ItemStatus, RequestedLength};
use crate::status::{QueueItemView, StateKind, StatusSnapshot};
use crate::store::CalibrationStore;
use crate::units::{Length, UnitMode, format_length, parse_length};
use crate::util::scale_ms;
use fence_traits::{
    Clock, Direction, DriveStatus, MotionDriver, MonotonicClock, MoveCommand, MoveHandle,
};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Floor for move deadlines so zero-length estimates cannot time out
/// against scheduling jitter.
const MIN_MOVE_TIMEOUT_MS: u64 = 100;

/// What a completed move leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    /// Queue item: ends in `AwaitingOperatorConfirm`.
    Cut(ItemId),
    /// Jog/park/move-to: ends back in `Idle`.
    Position,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    handle: MoveHandle,
    kind: MoveKind,
    target: Length,
    direction: Direction,
    /// Steps that produce travel (excludes backlash take-up).
    productive_steps: u32,
    deadline_ms: u64,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Homing {
        handle: MoveHandle,
        deadline_ms: u64,
    },
    /// Transient within one `tick`; never observed across ticks.
    Planning,
    Moving(InFlight),
    AwaitingOperatorConfirm {
        item: ItemId,
    },
    Error(FaultReason),
}

pub struct Controller {
    driver: Box<dyn MotionDriver>,
    store: CalibrationStore,
    motion: MotionCfg,
    display: DisplayCfg,
    queue: CutQueue,
    carriage: CarriageState,
    state: State,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    home_requested: bool,
    // Optional E-stop side channel; polled with debounce every tick.
    estop_check: Option<Box<dyn Fn() -> bool>>,
    estop_debounce_n: u8,
    estop_count: u8,
    estop_latched: bool,
    // Productive steps of the last completed move, for calibration runs.
    last_move_steps: Option<u64>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state_kind())
            .field("position", &self.carriage.position)
            .field("is_homed", &self.carriage.is_homed)
            .finish()
    }
}

impl Controller {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder<Missing> {
        ControllerBuilder::default()
    }

    // ── operator/API surface ────────────────────────────────────────────────

    /// Parse a length in the configured unit mode and queue it as a cut.
    pub fn submit_length(&mut self, text: &str) -> Result<ItemId> {
        self.submit_length_as(text, self.display.unit_mode)
    }

    /// Parse a length in an explicit unit mode and queue it as a cut.
    pub fn submit_length_as(&mut self, text: &str, mode: UnitMode) -> Result<ItemId> {
        let target =
            parse_length(text, mode, self.display.max_length).map_err(eyre::Report::new)?;
        let id = self.queue.enqueue(
            RequestedLength {
                text: text.trim().to_string(),
                mode,
            },
            target,
        );
        tracing::info!(item = %id, target = %target, "cut queued");
        Ok(id)
    }

    /// Cancel a pending item; the active item must be stopped first.
    pub fn cancel_item(&mut self, id: ItemId) -> Result<()> {
        self.queue.cancel(id).map_err(eyre::Report::new)?;
        tracing::info!(item = %id, "cut cancelled");
        Ok(())
    }

    /// Move a pending item to a new queue position.
    pub fn reorder_item(&mut self, id: ItemId, new_index: usize) -> Result<()> {
        self.queue
            .reorder(id, new_index)
            .map_err(eyre::Report::new)
    }

    /// Operator confirms the physical cut was made.
    pub fn confirm_cut(&mut self) -> Result<()> {
        let State::AwaitingOperatorConfirm { item } = self.state else {
            return Err(eyre::Report::new(ControlError::NothingToConfirm));
        };
        self.queue.set_status(item, ItemStatus::Done);
        tracing::info!(item = %item, "cut confirmed");
        self.state = State::Idle;
        Ok(())
    }

    /// Request a homing cycle; honored on the next idle tick.
    pub fn request_home(&mut self) {
        self.home_requested = true;
    }

    /// Positioning move to an absolute target; does not await a cut.
    pub fn request_move_to(&mut self, target: Length) -> Result<()> {
        match self.state {
            State::Idle => {}
            State::Error(_) => return Err(eyre::Report::new(ControlError::Faulted)),
            _ => return Err(eyre::Report::new(ControlError::Busy)),
        }
        if !self.carriage.is_homed {
            return Err(eyre::Report::new(ControlError::NotHomed));
        }
        let cmd = plan(
            &self.carriage,
            target,
            self.store.calibration(),
            &self.motion,
        )
        .map_err(eyre::Report::new)?;
        self.dispatch(cmd, MoveKind::Position, target)
    }

    /// Positioning move relative to the current position.
    pub fn request_jog(&mut self, delta: Length) -> Result<()> {
        self.request_move_to(self.carriage.position + delta)
    }

    /// Positioning move to the far track limit.
    pub fn request_park(&mut self) -> Result<()> {
        self.request_move_to(self.store.calibration().max_position)
    }

    /// Recompute steps-per-unit from the operator's measurement of the last
    /// completed move. The prior calibration is retained on rejection.
    pub fn request_calibration_run(&mut self, observed_length: Length) -> Result<Calibration> {
        match self.state {
            State::Idle => {}
            State::Error(_) => return Err(eyre::Report::new(ControlError::Faulted)),
            _ => return Err(eyre::Report::new(ControlError::Busy)),
        }
        let steps = self
            .last_move_steps
            .ok_or_else(|| eyre::Report::new(CalibrationError::NoReferenceMove))?;
        self.store.update_from_calibration_run(steps, observed_length)
    }

    /// Emergency stop: halts the driver immediately and latches
    /// `Error(Cancelled)`. The halted position is not reliably known, so the
    /// carriage is un-homed.
    pub fn emergency_stop(&mut self) {
        self.estop_latched = true;
        self.apply_estop();
    }

    /// Leave the `Error` state; forces a homing cycle before the queue
    /// resumes. Fails while the calibration itself is invalid.
    pub fn reset(&mut self) -> Result<()> {
        let State::Error(_) = self.state else {
            return Err(eyre::Report::new(ControlError::NotFaulted));
        };
        self.estop_latched = false;
        self.estop_count = 0;
        if self.store.calibration().validate().is_err() {
            self.state = State::Error(FaultReason::InvalidCalibration);
            return Err(eyre::Report::new(ControlError::Faulted));
        }
        tracing::info!("controller reset; homing required");
        self.home_requested = true;
        self.state = State::Idle;
        Ok(())
    }

    /// Advance the machine one step. Non-blocking; call at the configured
    /// poll period.
    pub fn tick(&mut self) -> StateKind {
        if self.estop_latched || self.poll_estop() {
            self.apply_estop();
            return self.state_kind();
        }
        match self.state {
            State::Idle => self.tick_idle(),
            State::Homing {
                handle,
                deadline_ms,
            } => self.tick_homing(handle, deadline_ms),
            State::Moving(mv) => self.tick_moving(mv),
            State::Planning | State::AwaitingOperatorConfirm { .. } | State::Error(_) => {}
        }
        self.state_kind()
    }

    // ── observers ───────────────────────────────────────────────────────────

    pub fn state_kind(&self) -> StateKind {
        match self.state {
            State::Idle => StateKind::Idle,
            State::Homing { .. } => StateKind::Homing,
            State::Planning => StateKind::PlanningMove,
            State::Moving(_) => StateKind::Moving,
            State::AwaitingOperatorConfirm { .. } => StateKind::AwaitingOperatorConfirm,
            State::Error(reason) => StateKind::Error(reason),
        }
    }

    pub fn position(&self) -> Length {
        self.carriage.position
    }

    pub fn is_homed(&self) -> bool {
        self.carriage.is_homed
    }

    pub fn queue(&self) -> &CutQueue {
        &self.queue
    }

    pub fn calibration(&self) -> &Calibration {
        self.store.calibration()
    }

    /// Point-in-time status for a front-end, positions formatted in the
    /// configured display unit.
    pub fn snapshot(&self) -> StatusSnapshot {
        let mode = self.display.unit_mode;
        let precision = self.display.precision();
        StatusSnapshot {
            state: self.state_kind(),
            is_homed: self.carriage.is_homed,
            position: self.carriage.position,
            position_display: format_length(self.carriage.position, mode, precision),
            queue: self
                .queue
                .items()
                .iter()
                .map(|i| QueueItemView {
                    id: i.id,
                    requested: i.requested.text.clone(),
                    target: format_length(i.target, mode, precision),
                    status: i.status,
                })
                .collect(),
        }
    }

    // ── state transitions ───────────────────────────────────────────────────

    fn tick_idle(&mut self) {
        if self.home_requested || (!self.carriage.is_homed && self.queue.has_pending()) {
            self.start_homing();
        } else if let Some(id) = self.queue.next_pending() {
            self.start_cut(id);
        }
    }

    fn start_homing(&mut self) {
        self.home_requested = false;
        match self.driver.seek_home() {
            Ok(handle) => {
                let deadline_ms = self.now_ms().saturating_add(self.motion.homing_timeout_ms);
                tracing::info!("homing started");
                self.state = State::Homing {
                    handle,
                    deadline_ms,
                };
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start homing");
                self.enter_fault(FaultReason::HardwareFault, None);
            }
        }
    }

    fn start_cut(&mut self, id: ItemId) {
        let Some(item) = self.queue.get(id) else {
            return;
        };
        let target = item.target;
        self.state = State::Planning;
        match plan(
            &self.carriage,
            target,
            self.store.calibration(),
            &self.motion,
        ) {
            Ok(cmd) => {
                self.queue.set_status(id, ItemStatus::InProgress);
                let _ = self.dispatch(cmd, MoveKind::Cut(id), target);
            }
            Err(e) => {
                // Carriage state is untouched: nothing moved.
                tracing::warn!(item = %id, error = %e, "plan rejected");
                let reason = FaultReason::from(e);
                self.queue.set_status(id, ItemStatus::Failed(reason));
                self.state = State::Error(reason);
            }
        }
    }

    fn dispatch(&mut self, cmd: MoveCommand, kind: MoveKind, target: Length) -> Result<()> {
        let productive = self
            .store
            .calibration()
            .steps_per_unit
            .steps_for(target - self.carriage.position)
            .unsigned_abs();
        let productive = u32::try_from(productive).unwrap_or(u32::MAX);
        let timeout =
            scale_ms(cmd.estimated_duration_ms(), self.motion.move_timeout_multiplier)
                .max(MIN_MOVE_TIMEOUT_MS);
        match self.driver.execute(&cmd) {
            Ok(handle) => {
                tracing::info!(
                    steps = cmd.steps,
                    direction = ?cmd.direction,
                    target = %target,
                    "move dispatched"
                );
                self.state = State::Moving(InFlight {
                    handle,
                    kind,
                    target,
                    direction: cmd.direction,
                    productive_steps: productive,
                    deadline_ms: self.now_ms().saturating_add(timeout),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "driver rejected command");
                let item = match kind {
                    MoveKind::Cut(id) => Some(id),
                    MoveKind::Position => None,
                };
                self.enter_fault(FaultReason::HardwareFault, item);
                Err(eyre::eyre!("driver rejected command: {e}"))
            }
        }
    }

    fn tick_homing(&mut self, handle: MoveHandle, deadline_ms: u64) {
        match self.driver.poll(handle) {
            Ok(DriveStatus::Pending) => {
                if self.now_ms() >= deadline_ms {
                    tracing::error!("homing timed out");
                    self.halt_quietly(handle);
                    self.enter_fault(FaultReason::HardwareFault, None);
                }
            }
            Ok(DriveStatus::Completed) => {
                self.carriage = CarriageState::homed_at(self.store.calibration().home_offset);
                tracing::info!(position = %self.carriage.position, "homing complete");
                self.state = State::Idle;
            }
            Ok(DriveStatus::Stalled | DriveStatus::Faulted) => {
                tracing::error!("homing seek failed");
                self.enter_fault(FaultReason::HardwareFault, None);
            }
            Err(e) => {
                tracing::error!(error = %e, "driver poll failed during homing");
                self.enter_fault(FaultReason::HardwareFault, None);
            }
        }
    }

    fn tick_moving(&mut self, mv: InFlight) {
        let item = match mv.kind {
            MoveKind::Cut(id) => Some(id),
            MoveKind::Position => None,
        };
        match self.driver.poll(mv.handle) {
            Ok(DriveStatus::Pending) => {
                // Never hang on a silent driver: past the deadline the move
                // is treated exactly like a stall.
                if self.now_ms() >= mv.deadline_ms {
                    tracing::error!(steps = mv.productive_steps, "move timed out");
                    self.halt_quietly(mv.handle);
                    self.enter_fault(FaultReason::HardwareFault, item);
                }
            }
            Ok(DriveStatus::Completed) => {
                self.carriage.position = mv.target;
                if mv.productive_steps > 0 {
                    self.carriage.last_direction = Some(mv.direction);
                    self.last_move_steps = Some(u64::from(mv.productive_steps));
                }
                match mv.kind {
                    MoveKind::Cut(id) => {
                        self.queue.set_status(id, ItemStatus::AwaitingCut);
                        tracing::info!(item = %id, position = %mv.target, "positioned; awaiting cut");
                        self.state = State::AwaitingOperatorConfirm { item: id };
                    }
                    MoveKind::Position => {
                        tracing::info!(position = %mv.target, "position move complete");
                        self.state = State::Idle;
                    }
                }
            }
            Ok(DriveStatus::Stalled) => {
                tracing::error!("stall reported mid-move");
                self.enter_fault(FaultReason::HardwareFault, item);
            }
            Ok(DriveStatus::Faulted) => {
                tracing::error!("driver fault mid-move");
                self.enter_fault(FaultReason::HardwareFault, item);
            }
            Err(e) => {
                tracing::error!(error = %e, "driver poll failed mid-move");
                self.enter_fault(FaultReason::HardwareFault, item);
            }
        }
    }

    /// Hardware-level failure: the true position can no longer be trusted,
    /// so the carriage is un-homed and a homing cycle is required to resume.
    /// Never retried silently: retrying a motion whose position is unknown
    /// risks a wrong cut.
    fn enter_fault(&mut self, reason: FaultReason, item: Option<ItemId>) {
        if let Some(id) = item {
            self.queue.set_status(id, ItemStatus::Failed(reason));
        }
        self.carriage.is_homed = false;
        self.carriage.last_direction = None;
        self.state = State::Error(reason);
    }

    fn halt_quietly(&mut self, handle: MoveHandle) {
        if let Err(e) = self.driver.halt(handle) {
            tracing::warn!(error = %e, "halt failed");
        }
    }

    fn poll_estop(&mut self) -> bool {
        if let Some(check) = &self.estop_check {
            if check() {
                self.estop_count = self.estop_count.saturating_add(1);
                if self.estop_count >= self.estop_debounce_n {
                    self.estop_latched = true;
                }
            } else {
                self.estop_count = 0;
            }
        }
        self.estop_latched
    }

    fn apply_estop(&mut self) {
        if let State::Error(FaultReason::Cancelled) = self.state {
            return;
        }
        tracing::warn!("emergency stop");
        let (handle, item) = match self.state {
            State::Homing { handle, .. } => (Some(handle), None),
            State::Moving(mv) => (
                Some(mv.handle),
                match mv.kind {
                    MoveKind::Cut(id) => Some(id),
                    MoveKind::Position => None,
                },
            ),
            State::AwaitingOperatorConfirm { item } => (None, Some(item)),
            _ => (None, None),
        };
        if let Some(h) = handle {
            self.halt_quietly(h);
        }
        self.home_requested = false;
        self.enter_fault(FaultReason::Cancelled, item);
    }

    #[inline]
    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

/// Builder for [`Controller`]. All fields are validated on `build()`.
pub struct ControllerBuilder<D> {
    driver: Option<Box<dyn MotionDriver>>,
    store: Option<CalibrationStore>,
    motion: Option<MotionCfg>,
    display: Option<DisplayCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    estop_check: Option<Box<dyn Fn() -> bool>>,
    estop_debounce_n: Option<u8>,
    _d: PhantomData<D>,
}

impl Default for ControllerBuilder<Missing> {
    fn default() -> Self {
        Self {
            driver: None,
            store: None,
            motion: None,
            display: None,
            clock: None,
            estop_check: None,
            estop_debounce_n: None,
            _d: PhantomData,
        }
    }
}

impl<D> ControllerBuilder<D> {
    pub fn with_store(mut self, store: CalibrationStore) -> Self {
        self.store = Some(store);
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }
    pub fn with_display(mut self, display: DisplayCfg) -> Self {
        self.display = Some(display);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_estop_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.estop_check = Some(Box::new(f));
        self
    }
    pub fn with_estop_debounce(mut self, n: u8) -> Self {
        self.estop_debounce_n = Some(n.max(1));
        self
    }

    /// Fallible build available in any type-state; returns a detailed
    /// `BuildError` for missing or invalid pieces.
    pub fn try_build(self) -> Result<Controller> {
        let ControllerBuilder {
            driver,
            store,
            motion,
            display,
            clock,
            estop_check,
            estop_debounce_n,
            _d: _,
        } = self;

        let driver = driver.ok_or_else(|| eyre::Report::new(BuildError::MissingDriver))?;
        let motion = motion.unwrap_or_default();
        let display = display.unwrap_or_default();
        let store =
            store.unwrap_or_else(|| CalibrationStore::volatile(Calibration::safe_default(), 0.20));

        if motion.max_velocity_sps == 0 || motion.start_velocity_sps == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "velocities must be > 0",
            )));
        }
        if motion.start_velocity_sps > motion.max_velocity_sps {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "start velocity exceeds max velocity",
            )));
        }
        if !(motion.move_timeout_multiplier.is_finite() && motion.move_timeout_multiplier >= 1.0)
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "move_timeout_multiplier must be >= 1.0",
            )));
        }
        if motion.homing_timeout_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "homing_timeout_ms must be >= 1",
            )));
        }
        if motion.acceleration_distance.as_nm() <= 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "acceleration_distance must be > 0",
            )));
        }
        if ![4, 8, 16, 32, 64].contains(&display.fraction_denominator) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "fraction_denominator must be one of 4, 8, 16, 32, 64",
            )));
        }
        if display.metric_decimals > 6 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "metric_decimals must be <= 6",
            )));
        }
        if display.max_length.as_nm() <= 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_length must be > 0",
            )));
        }
        if store.calibration().validate().is_err() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "calibration violates its invariants",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();

        Ok(Controller {
            driver,
            store,
            motion,
            display,
            queue: CutQueue::new(),
            carriage: CarriageState::unhomed(),
            state: State::Idle,
            clock,
            epoch,
            home_requested: false,
            estop_check,
            estop_debounce_n: estop_debounce_n.unwrap_or(2),
            estop_count: 0,
            estop_latched: false,
            last_move_steps: None,
        })
    }
}

impl ControllerBuilder<Missing> {
    pub fn with_driver(self, driver: impl MotionDriver + 'static) -> ControllerBuilder<Set> {
        let ControllerBuilder {
            driver: _,
            store,
            motion,
            display,
            clock,
            estop_check,
            estop_debounce_n,
            _d: _,
        } = self;
        ControllerBuilder {
            driver: Some(Box::new(driver)),
            store,
            motion,
            display,
            clock,
            estop_check,
            estop_debounce_n,
            _d: PhantomData,
        }
    }
}

impl ControllerBuilder<Set> {
    /// Validate and build the controller. Only available once a driver is
    /// set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}
