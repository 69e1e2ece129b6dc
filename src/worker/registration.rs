//! Handler registration with bounded retry

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::EngineClient;
use crate::error::{Result, UnmeshedError};
use crate::types::RegisterEntry;

const MAX_ATTEMPTS: u32 = 10;
const BACKOFF_CEILING: Duration = Duration::from_secs(10);

/// Announce the handler table to the engine, retrying up to ten times with
/// linear-plus-ceiling backoff (1 s, 3 s, 5 s, ... capped at 10 s). The final
/// failure is fatal to startup.
pub(crate) async fn register_with_retry(
    engine: &EngineClient,
    entries: &[RegisterEntry],
    shutdown: &CancellationToken,
) -> Result<()> {
    for attempt in 1..=MAX_ATTEMPTS {
        match engine.register(entries).await {
            Ok(()) => {
                info!(handlers = entries.len(), attempt, "Registered handler queues");
                return Ok(());
            }
            Err(err) if attempt == MAX_ATTEMPTS => {
                return Err(UnmeshedError::Registration(format!(
                    "giving up after {MAX_ATTEMPTS} attempts: {err}"
                )));
            }
            Err(err) => {
                let delay = registration_backoff(attempt);
                warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "Registration attempt failed, retrying"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        return Err(UnmeshedError::Shutdown(
                            "cancelled during registration".to_string(),
                        ));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    unreachable!("registration loop always returns within MAX_ATTEMPTS")
}

fn registration_backoff(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(2 * attempt - 1)).min(BACKOFF_CEILING)
}
