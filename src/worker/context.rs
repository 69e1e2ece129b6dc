//! # Per-Execution Context
//!
//! Ambient slot carrying the work item currently being executed. The value
//! follows one logical handler execution across `.await` suspension points,
//! including resumption on a different OS thread, and is invisible to every
//! other concurrent execution. Plain thread-local storage cannot provide
//! this; the slot is a tokio task-local scoped around the handler future.

use std::future::Future;

use crate::types::WorkItem;

tokio::task_local! {
    static CURRENT_ITEM: WorkItem;
}

/// Accessor for the work item of the enclosing handler execution
pub struct WorkContext;

impl WorkContext {
    /// Run `fut` with `item` installed as the ambient work item. The slot is
    /// cleared when the future returns or is dropped.
    pub async fn scope<F>(item: WorkItem, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_ITEM.scope(item, fut).await
    }

    /// The work item of the current logical execution, or `None` outside a
    /// handler scope.
    pub fn current() -> Option<WorkItem> {
        CURRENT_ITEM.try_with(|item| item.clone()).ok()
    }
}
