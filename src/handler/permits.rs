//! Per-handler permit accounting

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A unit of one handler's concurrency budget.
///
/// A slot is owned by exactly one holder at a time: the poll iteration that
/// acquired it, the dispatch executing its work item, or the submission
/// tracker awaiting delivery. Moving the slot transfers that ownership;
/// `release` (or drop, on abandonment paths) returns the permit to the pool
/// exactly once.
#[derive(Debug)]
pub struct PermitSlot {
    _permit: OwnedSemaphorePermit,
}

impl PermitSlot {
    /// Return the permit to its pool. Dropping the slot has the same effect;
    /// this method exists to make the terminal hand-back explicit at call
    /// sites that own the slot.
    pub fn release(self) {}
}

/// Counting semaphore sized to a handler's `max_in_progress`.
///
/// The sum of permits held by in-flight polls, executing dispatches, and
/// queued submissions never exceeds the capacity.
#[derive(Debug, Clone)]
pub struct PermitPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl PermitPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held by polls, dispatches, or queued submissions
    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking acquisition; `None` when the budget is exhausted
    pub fn try_acquire(&self) -> Option<PermitSlot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| PermitSlot { _permit: permit })
    }
}
