//! Wire types exchanged with the engine

mod queue;
mod step_result;
mod work_item;
mod work_response;

pub use queue::{PollRequest, RegisterEntry, StepQueueNameData, StepType};
pub use step_result::{HandlerOutput, StepResult, StepStatus};
pub use work_item::WorkItem;
pub use work_response::WorkResponse;

/// Key under which a completion timestamp is stamped into every response output
pub const WORK_COMPLETED_AT_KEY: &str = "__workCompletedAt";

/// Current time as epoch milliseconds
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
