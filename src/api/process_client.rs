//! # Process Management Client
//!
//! Thin request/response wrappers over the engine's process endpoints:
//! launching process executions, fetching their state, searching, and bulk
//! actions. No retry logic beyond the transport timeouts; the worker core
//! does not depend on any of this.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

use super::engine_client::EngineClient;

/// Request body for launching a process execution
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequestData {
    pub namespace: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub input: Map<String, Value>,
}

/// Process execution state as reported by the engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessData {
    pub process_id: i64,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
    pub output: Option<Map<String, Value>>,
    pub created: i64,
    pub updated: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Value>>,
}

/// Search parameters for `api/process/search`
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

/// Outcome of a bulk process action
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessActionResponse {
    pub count: i64,
    pub message: Option<String>,
}

/// Process-management wrapper sharing the engine client's transport
pub struct ProcessClient<'a> {
    engine: &'a EngineClient,
}

impl<'a> ProcessClient<'a> {
    pub(crate) fn new(engine: &'a EngineClient) -> Self {
        Self { engine }
    }

    /// Launch a process without waiting for it to finish
    pub async fn run_process_async(&self, request: &ProcessRequestData) -> Result<ProcessData> {
        self.post_json("api/process/runAsync", request).await
    }

    /// Launch a process and wait for its terminal state
    pub async fn run_process_sync(&self, request: &ProcessRequestData) -> Result<ProcessData> {
        self.post_json("api/process/runSync", request).await
    }

    /// Fetch one process execution, optionally with its step details
    pub async fn get_process_data(
        &self,
        process_id: i64,
        include_steps: bool,
    ) -> Result<ProcessData> {
        let url = self.engine.endpoint(&format!("api/process/{process_id}"))?;
        let response = self
            .engine
            .http()
            .get(url)
            .query(&[("includeSteps", include_steps)])
            .send()
            .await?;
        let response = EngineClient::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Search process executions by namespace, name, status, and time window
    pub async fn search_process_executions(
        &self,
        query: &ProcessSearchQuery,
    ) -> Result<Vec<ProcessData>> {
        let url = self.engine.endpoint("api/process/search")?;
        let response = self.engine.http().get(url).query(query).send().await?;
        let response = EngineClient::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Terminate the given process executions
    pub async fn bulk_terminate(
        &self,
        process_ids: &[i64],
        reason: &str,
    ) -> Result<ProcessActionResponse> {
        self.bulk_action("api/process/bulkTerminate", process_ids, reason)
            .await
    }

    /// Resume the given process executions
    pub async fn bulk_resume(&self, process_ids: &[i64]) -> Result<ProcessActionResponse> {
        self.bulk_action("api/process/bulkResume", process_ids, "")
            .await
    }

    /// Mark the given failed process executions as reviewed
    pub async fn bulk_reviewed(
        &self,
        process_ids: &[i64],
        reason: &str,
    ) -> Result<ProcessActionResponse> {
        self.bulk_action("api/process/bulkReviewed", process_ids, reason)
            .await
    }

    async fn bulk_action(
        &self,
        path: &str,
        process_ids: &[i64],
        reason: &str,
    ) -> Result<ProcessActionResponse> {
        let url = self.engine.endpoint(path)?;
        let body = serde_json::json!({
            "processIds": process_ids,
            "reason": reason,
        });
        let response = self.engine.http().post(url).json(&body).send().await?;
        let response = EngineClient::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json(&self, path: &str, request: &ProcessRequestData) -> Result<ProcessData> {
        let url = self.engine.endpoint(path)?;
        let response = self.engine.http().post(url).json(request).send().await?;
        let response = EngineClient::check_status(response).await?;
        Ok(response.json().await?)
    }
}
