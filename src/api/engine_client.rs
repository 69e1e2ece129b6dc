//! # Engine API Client
//!
//! HTTP client for the engine endpoints the worker core depends on:
//! handler registration, work polling, and bulk result submission.

use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Result, UnmeshedError};
use crate::types::{PollRequest, RegisterEntry, WorkItem, WorkResponse};

/// Header naming the polling host, sent with every poll request
const HOST_NAME_HEADER: &str = "UNMESHED_HOST_NAME";

/// HTTP client for engine communication. One instance is shared by the
/// polling controller, the submitter, and the registration path.
pub struct EngineClient {
    client: Client,
    base_url: Url,
    host_name: String,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("base_url", &self.base_url.as_str())
            .field("host_name", &self.host_name)
            .finish()
    }
}

impl EngineClient {
    /// Build the client: composes the server URL, installs the bearer header
    /// as a default, and resolves the poll host name once.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let server_url = config.server_url();
        // reqwest's Url::join resolves relative paths, so the base must end
        // with a slash for "api/..." segments to append rather than replace.
        let base_url = Url::parse(&format!("{server_url}/")).map_err(|e| {
            UnmeshedError::Configuration(format!("Invalid base URL '{server_url}': {e}"))
        })?;

        let mut default_headers = reqwest::header::HeaderMap::new();
        let bearer = auth_header(&config.client_id, &config.auth_token);
        default_headers.insert(
            reqwest::header::AUTHORIZATION,
            bearer
                .parse()
                .map_err(|e| UnmeshedError::Configuration(format!("Invalid auth token: {e}")))?,
        );

        let client = Client::builder()
            .connect_timeout(config.connection_timeout())
            .default_headers(default_headers)
            .user_agent(format!("unmeshed-client/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                UnmeshedError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            host_name: resolve_host_name(),
        })
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// PUT `api/clients/register`: announce the handler queues this client serves
    pub async fn register(&self, entries: &[RegisterEntry]) -> Result<()> {
        let url = self.endpoint("api/clients/register")?;
        debug!(count = entries.len(), "Registering handler queues");
        let response = self.client.put(url).json(entries).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// POST `api/clients/poll`: pull work items sized to available capacity
    pub async fn poll(&self, requests: &[PollRequest]) -> Result<Vec<WorkItem>> {
        let url = self.endpoint("api/clients/poll")?;
        let response = self
            .client
            .post(url)
            .header(HOST_NAME_HEADER, &self.host_name)
            .json(requests)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let items = response.json::<Vec<WorkItem>>().await?;
        Ok(items)
    }

    /// POST `api/clients/bulkResults`: submit a batch of work responses.
    /// Non-2xx surfaces the body text so the submitter can classify it.
    pub async fn submit_results(&self, responses: &[WorkResponse]) -> Result<()> {
        let url = self.endpoint("api/clients/bulkResults")?;
        let response = self.client.post(url).json(responses).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| UnmeshedError::Configuration(format!("Invalid endpoint {path}: {e}")))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(UnmeshedError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// `Bearer client.sdk.{client_id}.{sha256_hex(auth_token)}`
pub(crate) fn auth_header(client_id: &str, auth_token: &str) -> String {
    format!("Bearer client.sdk.{client_id}.{}", sha256_hex(auth_token))
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Poll host name: environment overrides first, then the OS hostname, then "-"
fn resolve_host_name() -> String {
    for var in [HOST_NAME_HEADER, "HOSTNAME", "COMPUTERNAME"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "-".to_string())
}
