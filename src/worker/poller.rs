//! # Polling Controller
//!
//! Long-running pull loop sized by credit: each iteration borrows the
//! permits a handler has free, asks the engine for exactly that many items,
//! hands one borrowed permit to the dispatcher with every delivered item, and
//! returns the surplus to the pool. The host therefore never accepts more
//! work than it can immediately run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::EngineClient;
use crate::config::{ClientConfig, MAX_POLL_BATCH_SIZE};
use crate::handler::{HandlerKey, HandlerTable, PermitSlot};
use crate::types::{PollRequest, StepQueueNameData};

use super::dispatcher::WorkDispatcher;
use super::submitter::SubmitQueue;

/// Backoff after a failed poll before the next attempt
const POLL_FAILURE_BACKOFF: Duration = Duration::from_secs(1);
/// Cadence of the periodic status line
const STATUS_LINE_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) struct PollingController {
    engine: Arc<EngineClient>,
    handlers: Arc<HandlerTable>,
    dispatcher: WorkDispatcher,
    submit_queue: SubmitQueue,
    batch_size: usize,
    interval: Duration,
    shutdown: CancellationToken,
}

impl PollingController {
    pub fn new(
        engine: Arc<EngineClient>,
        handlers: Arc<HandlerTable>,
        dispatcher: WorkDispatcher,
        submit_queue: SubmitQueue,
        config: &ClientConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            handlers,
            dispatcher,
            submit_queue,
            batch_size: config.work_request_batch_size,
            interval: Duration::from_millis(config.poll_interval_millis),
            shutdown,
        }
    }

    /// Run until shutdown. Poll failures never terminate the loop; the first
    /// is logged at error and the rest suppressed until a poll delivers work
    /// again.
    pub async fn run(self) {
        info!(
            handlers = self.handlers.len(),
            host_name = %self.engine.host_name(),
            "Polling controller starting"
        );
        let mut errors_suppressed = false;
        let mut last_status = Instant::now();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let (requests, mut acquired) = self.acquire_credit();
            if !requests.is_empty() {
                match self.engine.poll(&requests).await {
                    Ok(items) => {
                        if errors_suppressed && !items.is_empty() {
                            info!("Polling recovered, engine is reachable again");
                            errors_suppressed = false;
                        }
                        self.dispatch_items(items, &mut acquired);
                    }
                    Err(err) => {
                        if !errors_suppressed {
                            error!(error = %err, "Poll request failed; suppressing repeats until recovery");
                            errors_suppressed = true;
                        }
                        acquired.clear();
                        tokio::select! {
                            _ = self.shutdown.cancelled() => break,
                            _ = tokio::time::sleep(POLL_FAILURE_BACKOFF) => {}
                        }
                    }
                }
            }
            // Surplus permits (acquired but unmatched by any returned item)
            // go back to their pools before the pacing sleep.
            acquired.clear();

            if last_status.elapsed() >= STATUS_LINE_INTERVAL {
                self.log_status();
                last_status = Instant::now();
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Polling controller stopped");
    }

    /// Borrow up to `min(available, batch size, cap)` permits per handler and
    /// build the matching poll request entries.
    fn acquire_credit(&self) -> (Vec<PollRequest>, HashMap<HandlerKey, Vec<PermitSlot>>) {
        let mut requests = Vec::new();
        let mut acquired = HashMap::new();
        for (key, registered) in self.handlers.iter() {
            let size = registered
                .pool
                .available()
                .min(self.batch_size)
                .min(MAX_POLL_BATCH_SIZE);
            if size == 0 {
                continue;
            }
            let mut slots = Vec::with_capacity(size);
            for _ in 0..size {
                match registered.pool.try_acquire() {
                    Some(slot) => slots.push(slot),
                    None => break,
                }
            }
            if slots.is_empty() {
                continue;
            }
            requests.push(PollRequest {
                step_queue_name_data: StepQueueNameData::worker(
                    key.namespace.clone(),
                    key.name.clone(),
                ),
                size: slots.len(),
            });
            acquired.insert(key.clone(), slots);
        }
        (requests, acquired)
    }

    /// Pair every returned item with one of the permits borrowed for its
    /// queue and hand both to the dispatcher, in arrival order.
    fn dispatch_items(
        &self,
        items: Vec<crate::types::WorkItem>,
        acquired: &mut HashMap<HandlerKey, Vec<PermitSlot>>,
    ) {
        for item in items {
            let key = HandlerKey::new(item.step_namespace.clone(), item.step_name.clone());
            let slot = match acquired.get_mut(&key).and_then(Vec::pop) {
                Some(slot) => Some(slot),
                // The engine delivered beyond what this iteration requested
                // for the queue; take a fresh permit if the budget allows.
                None => self
                    .handlers
                    .get(&item.step_namespace, &item.step_name)
                    .and_then(|registered| registered.pool.try_acquire()),
            };
            match slot {
                Some(slot) => {
                    debug!(
                        step_execution_id = item.step_execution_id,
                        queue = %key,
                        "Dispatching polled work item"
                    );
                    self.dispatcher.dispatch(item, slot);
                }
                None => {
                    warn!(
                        queue = %key,
                        step_execution_id = item.step_execution_id,
                        "Received work item with no free permit; dropping it for the engine to requeue"
                    );
                }
            }
        }
    }

    fn log_status(&self) {
        let mut in_use = 0;
        let mut capacity = 0;
        for (_, registered) in self.handlers.iter() {
            in_use += registered.pool.in_use();
            capacity += registered.pool.capacity();
        }
        info!(
            permits_in_use = in_use,
            permits_capacity = capacity,
            queued_submissions = self.submit_queue.depth(),
            "Worker status"
        );
    }
}
