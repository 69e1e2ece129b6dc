//! # Unmeshed Client
//!
//! Top-level facade tying the worker core together: handler registration
//! before startup, the polling and submission loops after, and process
//! management convenience methods throughout.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{EngineClient, ProcessClient};
use crate::config::ClientConfig;
use crate::error::{Result, UnmeshedError};
use crate::handler::{HandlerEntry, HandlerTable};
use crate::worker::dispatcher::WorkDispatcher;
use crate::worker::poller::PollingController;
use crate::worker::registration::register_with_retry;
use crate::worker::submitter::{ResponseSubmitter, SubmitQueue};

struct RunningState {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    submit_queue: SubmitQueue,
}

/// Client connecting this host to an Unmeshed engine.
///
/// ```no_run
/// use unmeshed_client::{ClientConfig, HandlerEntry, UnmeshedClient};
///
/// # async fn run() -> unmeshed_client::Result<()> {
/// let mut client = UnmeshedClient::new(ClientConfig::new("worker-1", "token"))?;
/// client.register_handler(HandlerEntry::from_fn("default", "echo", |item| async move {
///     Ok(serde_json::Value::Object(item.input_param).into())
/// }))?;
/// client.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct UnmeshedClient {
    config: Arc<ClientConfig>,
    engine: Arc<EngineClient>,
    table: HandlerTable,
    running: Option<RunningState>,
}

impl UnmeshedClient {
    /// Validate the configuration and build the transport. Fails
    /// synchronously on missing credentials, an empty base URL, or a port of
    /// zero.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let engine = Arc::new(EngineClient::new(&config)?);
        Ok(Self {
            config: Arc::new(config),
            engine,
            table: HandlerTable::new(),
            running: None,
        })
    }

    /// Register a handler. Only permitted before `start()`.
    pub fn register_handler(&mut self, entry: HandlerEntry) -> Result<()> {
        if self.running.is_some() {
            return Err(UnmeshedError::AlreadyStarted);
        }
        self.table.register(entry)
    }

    /// Announce the handler table to the engine and spawn the polling and
    /// submission loops. When batch processing is disabled this logs and does
    /// nothing: no polling, no submitting.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(UnmeshedError::AlreadyStarted);
        }
        if !self.config.enable_batch_processing {
            info!("Batch processing is disabled; start is a no-op (no polling, no submitting)");
            return Ok(());
        }
        if self.table.is_empty() {
            warn!("Starting with no registered handlers; nothing will be polled");
        }

        tokio::time::sleep(Duration::from_millis(self.config.initial_delay_millis)).await;

        let shutdown = CancellationToken::new();
        // Register before freezing the table so a failed startup leaves the
        // client reusable.
        register_with_retry(&self.engine, &self.table.register_entries(), &shutdown).await?;
        let handlers = Arc::new(std::mem::take(&mut self.table));

        let (submit_queue, submitter) =
            ResponseSubmitter::new(Arc::clone(&self.engine), &self.config, shutdown.child_token());
        let dispatcher = WorkDispatcher::new(
            Arc::clone(&handlers),
            self.config.fixed_thread_pool_size,
            submit_queue.clone(),
            self.config.step_timeout(),
            shutdown.child_token(),
        );
        let poller = PollingController::new(
            Arc::clone(&self.engine),
            handlers,
            dispatcher,
            submit_queue.clone(),
            &self.config,
            shutdown.child_token(),
        );

        let tasks = vec![tokio::spawn(submitter.run()), tokio::spawn(poller.run())];
        self.running = Some(RunningState {
            shutdown,
            tasks,
            submit_queue,
        });
        info!(client_id = %self.config.client_id, "Unmeshed client started");
        Ok(())
    }

    /// Cancel every loop and wait for them to wind down. In-flight work is
    /// abandoned; the engine will requeue it.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(state) = self.running.take() else {
            return Ok(());
        };
        state.shutdown.cancel();
        for task in state.tasks {
            task.await
                .map_err(|e| UnmeshedError::Shutdown(format!("worker task panicked: {e}")))?;
        }
        info!("Unmeshed client stopped");
        Ok(())
    }

    /// Responses enqueued but not yet terminally submitted or dropped
    pub fn pending_submissions(&self) -> usize {
        self.running
            .as_ref()
            .map(|state| state.submit_queue.depth())
            .unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Process-management operations sharing this client's transport
    pub fn process_client(&self) -> ProcessClient<'_> {
        ProcessClient::new(&self.engine)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
