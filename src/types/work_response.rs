//! Work response submitted back to the engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::StepStatus;

/// Outcome of one work item attempt. Identity is `step_execution_id`; the
/// engine keys results by it, which is what makes at-least-once submission
/// safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkResponse {
    pub step_id: i64,
    pub process_id: i64,
    pub step_execution_id: i64,
    pub run_count: i32,
    pub output: Map<String, Value>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_after_seconds: Option<i64>,
    pub started_at: i64,
}
