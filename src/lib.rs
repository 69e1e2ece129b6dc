//! # unmeshed-client
//!
//! Rust client SDK for the Unmeshed orchestration engine. The client
//! announces the step handlers this host serves, continuously pulls work
//! sized to the capacity those handlers have free, dispatches each work item
//! to its handler under a per-handler concurrency budget, and submits
//! results back in durable, batched, retrying fashion.
//!
//! ## Core pieces
//!
//! - [`UnmeshedClient`]: the facade (configuration, handler registration,
//!   `start()`/`stop()`)
//! - [`WorkHandler`] / [`HandlerEntry`]: the host-supplied handler surface
//! - [`WorkContext`]: ambient access to the work item of the current
//!   logical execution, from arbitrarily nested code
//! - [`types`]: the wire shapes exchanged with the engine
//!
//! Handlers return any JSON value (wrapped into the response output), or a
//! [`StepResult`] when they need to fail explicitly, keep running, or ask to
//! be rescheduled.

pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod types;
pub mod worker;

mod client;

pub use client::UnmeshedClient;
pub use config::ClientConfig;
pub use error::{Result, UnmeshedError};
pub use handler::{FnHandler, HandlerEntry, SchedulingDomain, WorkHandler};
pub use types::{HandlerOutput, StepResult, StepStatus, WorkItem, WorkResponse};
pub use worker::WorkContext;
