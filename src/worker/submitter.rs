//! # Response Submitter
//!
//! Drains work responses in batches to the engine's bulk-results endpoint,
//! retrying transient failures and retiring permanently-failed responses.
//!
//! The bulk protocol reports no per-item outcome, so classification is
//! batch-uniform: a permanent-error keyword in the response body retires
//! every tracker in that batch, and any other failure marks the whole batch
//! transient. This can retire trackers that would have succeeded if retried
//! individually; each tracker's attempt budget still applies on the
//! transient path. Refine if the engine ever returns per-item status.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::EngineClient;
use crate::config::ClientConfig;
use crate::error::UnmeshedError;
use crate::handler::PermitSlot;
use crate::types::{epoch_millis, WorkResponse};

/// A response awaiting delivery, holding its handler's permit until the
/// submission reaches a terminal outcome.
struct SubmissionTracker {
    response: WorkResponse,
    slot: PermitSlot,
    attempts: u32,
    enqueued_at: i64,
}

/// Handle for enqueuing responses; cloned into every dispatch
#[derive(Clone)]
pub(crate) struct SubmitQueue {
    tx: mpsc::UnboundedSender<SubmissionTracker>,
    depth: Arc<AtomicUsize>,
}

impl SubmitQueue {
    /// Enqueue a response together with the permit it carries. If the
    /// submitter is gone the tracker is dropped and the permit released.
    pub fn push(&self, response: WorkResponse, slot: PermitSlot) {
        self.depth.fetch_add(1, Ordering::Relaxed);
        let tracker = SubmissionTracker {
            response,
            slot,
            attempts: 0,
            enqueued_at: epoch_millis(),
        };
        if self.tx.send(tracker).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            error!("Submitter is stopped; dropping response and releasing its permit");
        }
    }

    /// Responses enqueued but not yet terminally submitted or dropped
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

enum Classification {
    Transient,
    Permanent,
}

/// Single background task draining the submission queue
pub(crate) struct ResponseSubmitter {
    rx: mpsc::UnboundedReceiver<SubmissionTracker>,
    queue: SubmitQueue,
    engine: Arc<EngineClient>,
    batch_size: usize,
    max_attempts: u32,
    keywords: Vec<String>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ResponseSubmitter {
    pub fn new(
        engine: Arc<EngineClient>,
        config: &ClientConfig,
        shutdown: CancellationToken,
    ) -> (SubmitQueue, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = SubmitQueue {
            tx,
            depth: Arc::new(AtomicUsize::new(0)),
        };
        let submitter = Self {
            rx,
            queue: queue.clone(),
            engine,
            batch_size: config.response_submit_batch_size,
            max_attempts: config.max_submit_attempts,
            keywords: config
                .permanent_error_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            interval: Duration::from_millis(config.submit_interval_millis),
            shutdown,
        };
        (queue, submitter)
    }

    pub async fn run(mut self) {
        info!(batch_size = self.batch_size, "Response submitter starting");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let mut batch = Vec::new();
            while batch.len() < self.batch_size {
                match self.rx.try_recv() {
                    Ok(tracker) => batch.push(tracker),
                    Err(_) => break,
                }
            }
            if batch.is_empty() {
                continue;
            }
            self.submit_batch(batch).await;
        }
        info!(
            pending = self.queue.depth(),
            "Response submitter stopped"
        );
    }

    /// One bulk attempt for `batch`. Only the two terminal outcomes (accepted
    /// by the engine, or retired as permanent / out of attempts) release a
    /// tracker's permit; transient failures re-enqueue at the tail.
    async fn submit_batch(&self, batch: Vec<SubmissionTracker>) {
        let responses: Vec<WorkResponse> = batch.iter().map(|t| t.response.clone()).collect();
        match self.engine.submit_results(&responses).await {
            Ok(()) => {
                debug!(count = batch.len(), "Bulk submission accepted");
                for tracker in batch {
                    self.retire(tracker);
                }
            }
            Err(err) => {
                let classification = classify_failure(&err, &self.keywords);
                for mut tracker in batch {
                    tracker.attempts += 1;
                    match classification {
                        Classification::Permanent => {
                            error!(
                                step_execution_id = tracker.response.step_execution_id,
                                attempts = tracker.attempts,
                                error = %err,
                                "Dropping response after permanent submission failure"
                            );
                            self.retire(tracker);
                        }
                        Classification::Transient if tracker.attempts >= self.max_attempts => {
                            error!(
                                step_execution_id = tracker.response.step_execution_id,
                                attempts = tracker.attempts,
                                error = %err,
                                "Dropping response after exhausting submission attempts"
                            );
                            self.retire(tracker);
                        }
                        Classification::Transient => {
                            debug!(
                                step_execution_id = tracker.response.step_execution_id,
                                attempts = tracker.attempts,
                                "Re-enqueuing response after transient submission failure"
                            );
                            if self.queue.tx.send(tracker).is_err() {
                                self.queue.depth.fetch_sub(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
            }
        }
    }

    fn retire(&self, tracker: SubmissionTracker) {
        self.queue.depth.fetch_sub(1, Ordering::Relaxed);
        let waited_ms = epoch_millis() - tracker.enqueued_at;
        debug!(
            step_execution_id = tracker.response.step_execution_id,
            waited_ms, "Retiring submission tracker"
        );
        tracker.slot.release();
    }
}

/// The engine signals non-retriable rejections only through body text, so a
/// failure is permanent exactly when a configured keyword appears in it.
fn classify_failure(err: &UnmeshedError, keywords: &[String]) -> Classification {
    if let UnmeshedError::Api { body, .. } = err {
        let body = body.to_lowercase();
        if keywords.iter().any(|k| body.contains(k)) {
            return Classification::Permanent;
        }
    }
    Classification::Transient
}
