//! Status reporting for the GUI/API layer.

use crate::error::FaultReason;
use crate::queue::{ItemId, ItemStatus};
use crate::units::Length;

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Homing,
    PlanningMove,
    Moving,
    AwaitingOperatorConfirm,
    /// The only state requiring explicit operator intervention.
    Error(FaultReason),
}

/// One queue item as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItemView {
    pub id: ItemId,
    /// The length as entered.
    pub requested: String,
    /// Target formatted in the configured display unit.
    pub target: String,
    pub status: ItemStatus,
}

/// Point-in-time snapshot for a front-end; no live references into the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: StateKind,
    pub is_homed: bool,
    pub position: Length,
    /// Position formatted in the configured display unit.
    pub position_display: String,
    pub queue: Vec<QueueItemView>,
}
