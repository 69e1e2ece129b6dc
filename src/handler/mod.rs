//! # Handler Surface
//!
//! Host-supplied work handlers and their registration metadata. A handler is
//! registered under a `(namespace, name)` pair together with its concurrency
//! budget and scheduling-domain hint; the table is read-only once the client
//! starts.

mod permits;
mod registry;

pub use permits::{PermitPool, PermitSlot};
pub use registry::{HandlerKey, HandlerTable, RegisteredHandler};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{HandlerOutput, WorkItem};

/// Scheduling domain a handler runs in.
///
/// I/O-bound handlers run directly on the cooperative runtime; CPU-bound
/// handlers are served from a bounded pool so they cannot starve the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingDomain {
    #[default]
    Io,
    Cpu,
}

/// A work handler invoked for every item polled from its queue.
///
/// Implementations must be `Send + Sync`: executions run concurrently, up to
/// the registered `max_in_progress`.
#[async_trait]
pub trait WorkHandler: Send + Sync + 'static {
    async fn execute(&self, item: &WorkItem) -> Result<HandlerOutput>;
}

/// Adapter turning an async closure into a [`WorkHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn wrap(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> WorkHandler for FnHandler<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HandlerOutput>> + Send + 'static,
{
    async fn execute(&self, item: &WorkItem) -> Result<HandlerOutput> {
        (self.f)(item.clone()).await
    }
}

/// A handler plus its registration metadata
#[derive(Clone)]
pub struct HandlerEntry {
    pub namespace: String,
    pub name: String,
    pub handler: Arc<dyn WorkHandler>,
    pub max_in_progress: usize,
    pub domain: SchedulingDomain,
}

impl HandlerEntry {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        handler: Arc<dyn WorkHandler>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            handler,
            max_in_progress: 1,
            domain: SchedulingDomain::Io,
        }
    }

    /// Convenience constructor for closure handlers
    pub fn from_fn<F, Fut>(
        namespace: impl Into<String>,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput>> + Send + 'static,
    {
        Self::new(namespace, name, Arc::new(FnHandler { f }))
    }

    pub fn with_max_in_progress(mut self, max_in_progress: usize) -> Self {
        self.max_in_progress = max_in_progress.max(1);
        self
    }

    pub fn with_domain(mut self, domain: SchedulingDomain) -> Self {
        self.domain = domain;
        self
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("max_in_progress", &self.max_in_progress)
            .field("domain", &self.domain)
            .finish()
    }
}
