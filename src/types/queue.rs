//! Registration and poll request bodies

use serde::{Deserialize, Serialize};

/// Kind of step queue a client can serve. The worker SDK only uses `Worker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    #[default]
    Worker,
}

/// Identifies one step queue on the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepQueueNameData {
    pub org_id: i64,
    pub namespace: String,
    pub step_type: StepType,
    pub name: String,
}

impl StepQueueNameData {
    pub fn worker(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            org_id: 1,
            namespace: namespace.into(),
            step_type: StepType::Worker,
            name: name.into(),
        }
    }
}

/// One entry of a poll request: a queue and how many items to pull from it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub step_queue_name_data: StepQueueNameData,
    pub size: usize,
}

/// One entry of the registration body announcing a served queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEntry {
    pub process_id: i64,
    pub namespace: String,
    pub step_type: StepType,
    pub name: String,
}

impl RegisterEntry {
    pub fn worker(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            process_id: 0,
            namespace: namespace.into(),
            step_type: StepType::Worker,
            name: name.into(),
        }
    }
}
