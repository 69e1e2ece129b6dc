//! # Work Dispatcher
//!
//! Runs each polled work item through its registered handler in the right
//! scheduling domain, enforces the per-step deadline, and normalizes whatever
//! comes back (value, error, panic, or timeout) into a work response handed
//! to the submitter.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::handler::{HandlerTable, PermitSlot, SchedulingDomain, WorkHandler};
use crate::types::{
    epoch_millis, StepResult, StepStatus, WorkItem, WorkResponse, WORK_COMPLETED_AT_KEY,
};

use super::context::WorkContext;
use super::submitter::SubmitQueue;

/// Error messages in responses are capped at this many characters
const ERROR_MESSAGE_LIMIT: usize = 1000;
const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// Dispatches work items to handlers and forwards their responses.
///
/// Each dispatched item holds exactly one permit; the permit travels with
/// the response into the submit queue and is released only on a terminal
/// submission outcome, or directly here when dispatch is abandoned first
/// (unknown handler, shutdown before submit).
#[derive(Clone)]
pub(crate) struct WorkDispatcher {
    handlers: Arc<HandlerTable>,
    cpu_gate: Arc<Semaphore>,
    submit_queue: SubmitQueue,
    step_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl WorkDispatcher {
    pub fn new(
        handlers: Arc<HandlerTable>,
        cpu_pool_size: usize,
        submit_queue: SubmitQueue,
        step_timeout: Option<Duration>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            handlers,
            cpu_gate: Arc::new(Semaphore::new(cpu_pool_size)),
            submit_queue,
            step_timeout,
            shutdown,
        }
    }

    /// Route one work item to its handler. Takes ownership of the permit the
    /// poller acquired for it.
    pub fn dispatch(&self, item: WorkItem, slot: PermitSlot) {
        let Some(registered) = self.handlers.get(&item.step_namespace, &item.step_name) else {
            warn!(
                step_namespace = %item.step_namespace,
                step_name = %item.step_name,
                step_execution_id = item.step_execution_id,
                "No handler registered for polled work item; dropping it"
            );
            slot.release();
            return;
        };
        let handler = Arc::clone(&registered.entry.handler);
        let domain = registered.entry.domain;
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run_item(handler, domain, item, slot).await });
    }

    async fn run_item(
        self,
        handler: Arc<dyn WorkHandler>,
        domain: SchedulingDomain,
        item: WorkItem,
        slot: PermitSlot,
    ) {
        // CPU-bound handlers wait for a seat in the bounded pool so they
        // cannot crowd out the cooperative I/O domain.
        let _cpu_seat = match domain {
            SchedulingDomain::Cpu => {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        slot.release();
                        return;
                    }
                    seat = self.cpu_gate.clone().acquire_owned() => match seat {
                        Ok(seat) => Some(seat),
                        Err(_) => {
                            slot.release();
                            return;
                        }
                    },
                }
            }
            SchedulingDomain::Io => None,
        };

        let started_at = if item.started > 0 {
            item.started
        } else {
            epoch_millis()
        };

        let result = tokio::select! {
            _ = self.shutdown.cancelled() => {
                debug!(
                    step_execution_id = item.step_execution_id,
                    "Shutdown during execution; abandoning work item"
                );
                slot.release();
                return;
            }
            result = execute_handler(handler, &item, self.step_timeout) => result,
        };

        let response = build_response(&item, result, started_at);
        debug!(
            step_execution_id = response.step_execution_id,
            status = ?response.status,
            "Handing response to submitter"
        );
        self.submit_queue.push(response, slot);
    }
}

/// Run the handler inside the per-execution context scope, with the deadline
/// and panic guard around it. Never propagates the handler's failure.
async fn execute_handler(
    handler: Arc<dyn WorkHandler>,
    item: &WorkItem,
    deadline: Option<Duration>,
) -> StepResult {
    let scoped_item = item.clone();
    let handler_item = item.clone();
    let call = WorkContext::scope(scoped_item, async move {
        handler.execute(&handler_item).await
    });
    let guarded = AssertUnwindSafe(call).catch_unwind();

    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return failure_result(format!(
                    "Step timed out after {} ms",
                    limit.as_millis()
                ));
            }
        },
        None => guarded.await,
    };

    match outcome {
        Ok(Ok(output)) => output.into_step_result(),
        Ok(Err(err)) => failure_result(error_message(err)),
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            failure_result(format!("Handler panicked: {message}"))
        }
    }
}

/// The message reported to the engine. `Handler` failures carry the host's
/// own message verbatim; everything else uses the error's display form.
fn error_message(err: crate::error::UnmeshedError) -> String {
    match err {
        crate::error::UnmeshedError::Handler(message) => message,
        other => other.to_string(),
    }
}

fn failure_result(message: String) -> StepResult {
    let mut output = serde_json::Map::new();
    output.insert(
        "error".to_string(),
        serde_json::Value::String(truncate_error(&message)),
    );
    StepResult::failed(output)
}

/// Build the response submitted to the engine: identity fields copied from
/// the work item, effective status, and the completion stamp.
fn build_response(item: &WorkItem, result: StepResult, started_at: i64) -> WorkResponse {
    let status = result.effective_status();
    let mut output = result.output;
    output.insert(
        WORK_COMPLETED_AT_KEY.to_string(),
        serde_json::Value::from(epoch_millis()),
    );
    WorkResponse {
        step_id: item.step_id,
        process_id: item.process_id,
        step_execution_id: item.step_execution_id,
        run_count: item.run_count,
        output,
        status,
        reschedule_after_seconds: if status == StepStatus::Running {
            result.reschedule_after_seconds
        } else {
            None
        },
        started_at,
    }
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() <= ERROR_MESSAGE_LIMIT {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(ERROR_MESSAGE_LIMIT).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}
