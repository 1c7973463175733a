//! FIFO queue of pending cut lengths.
//!
//! The queue is a passive data structure: it validates operator edits
//! (cancel/reorder touch pending items only) but item status transitions are
//! driven solely by the controller, which enforces the single-in-flight
//! invariant.

use crate::error::{FaultReason, QueueError};
use crate::units::{Length, UnitMode};

/// Opaque token identifying one queued cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The length exactly as the operator entered it, for display and audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLength {
    pub text: String,
    pub mode: UnitMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    InProgress,
    /// Carriage positioned; waiting for the operator to make the cut.
    AwaitingCut,
    Done,
    Cancelled,
    Failed(FaultReason),
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Done | ItemStatus::Cancelled | ItemStatus::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutItem {
    pub id: ItemId,
    pub requested: RequestedLength,
    pub target: Length,
    pub status: ItemStatus,
}

/// Ordered cut list; FIFO by default, pending items may be reordered.
#[derive(Debug, Default)]
pub struct CutQueue {
    items: Vec<CutItem>,
    next_id: u64,
}

impl CutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, requested: RequestedLength, target: Length) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.push(CutItem {
            id,
            requested,
            target,
            status: ItemStatus::Pending,
        });
        id
    }

    pub fn items(&self) -> &[CutItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&CutItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// First pending item in queue order, if any.
    pub fn next_pending(&self) -> Option<ItemId> {
        self.items
            .iter()
            .find(|i| i.status == ItemStatus::Pending)
            .map(|i| i.id)
    }

    pub fn has_pending(&self) -> bool {
        self.next_pending().is_some()
    }

    /// Cancel a pending item. The active item must be stopped through the
    /// controller instead.
    pub fn cancel(&mut self, id: ItemId) -> Result<(), QueueError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(QueueError::UnknownItem)?;
        match item.status {
            ItemStatus::Pending => {
                item.status = ItemStatus::Cancelled;
                Ok(())
            }
            ItemStatus::InProgress | ItemStatus::AwaitingCut => {
                Err(QueueError::CannotCancelActive)
            }
            _ => Err(QueueError::AlreadyFinished),
        }
    }

    /// Move a pending item to `new_index` (clamped to the queue length).
    pub fn reorder(&mut self, id: ItemId, new_index: usize) -> Result<(), QueueError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(QueueError::UnknownItem)?;
        match self.items[pos].status {
            ItemStatus::Pending => {}
            ItemStatus::InProgress | ItemStatus::AwaitingCut => {
                return Err(QueueError::CannotReorderActive);
            }
            _ => return Err(QueueError::AlreadyFinished),
        }
        let item = self.items.remove(pos);
        let new_index = new_index.min(self.items.len());
        self.items.insert(new_index, item);
        Ok(())
    }

    /// Controller-only status transition.
    pub(crate) fn set_status(&mut self, id: ItemId, status: ItemStatus) {
        if status == ItemStatus::InProgress {
            debug_assert!(
                !self
                    .items
                    .iter()
                    .any(|i| i.status == ItemStatus::InProgress),
                "two items in progress"
            );
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            tracing::debug!(item = %id, ?status, "queue item status");
            item.status = status;
        }
    }

    /// Number of items currently `InProgress` (0 or 1 by invariant).
    pub fn in_progress_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::InProgress)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: &str) -> RequestedLength {
        RequestedLength {
            text: text.to_string(),
            mode: UnitMode::Metric,
        }
    }

    fn queue_with(n: usize) -> (CutQueue, Vec<ItemId>) {
        let mut q = CutQueue::new();
        let ids = (0..n)
            .map(|i| q.enqueue(req(&format!("{i}")), Length::from_mm(i as i64)))
            .collect();
        (q, ids)
    }

    #[test]
    fn fifo_order_by_default() {
        let (q, ids) = queue_with(3);
        assert_eq!(q.next_pending(), Some(ids[0]));
    }

    #[test]
    fn cancel_pending_only() {
        let (mut q, ids) = queue_with(2);
        q.set_status(ids[0], ItemStatus::InProgress);
        assert_eq!(q.cancel(ids[0]), Err(QueueError::CannotCancelActive));
        assert_eq!(q.cancel(ids[1]), Ok(()));
        assert_eq!(q.cancel(ids[1]), Err(QueueError::AlreadyFinished));
        assert_eq!(q.next_pending(), None);
    }

    #[test]
    fn reorder_moves_pending_item() {
        let (mut q, ids) = queue_with(3);
        q.reorder(ids[2], 0).unwrap();
        assert_eq!(q.next_pending(), Some(ids[2]));
        // Index past the end clamps to the tail.
        q.reorder(ids[2], 99).unwrap();
        assert_eq!(q.next_pending(), Some(ids[0]));
    }

    #[test]
    fn reorder_rejects_active_and_unknown() {
        let (mut q, ids) = queue_with(2);
        q.set_status(ids[0], ItemStatus::InProgress);
        assert_eq!(q.reorder(ids[0], 1), Err(QueueError::CannotReorderActive));
        assert_eq!(
            q.reorder(ItemId(999), 0),
            Err(QueueError::UnknownItem)
        );
    }

    #[test]
    fn skips_cancelled_items() {
        let (mut q, ids) = queue_with(3);
        q.cancel(ids[0]).unwrap();
        assert_eq!(q.next_pending(), Some(ids[1]));
    }
}
