//! # Client Configuration
//!
//! Configuration for the Unmeshed client. A `ClientConfig` is assembled with
//! builder-style setters (or from `UNMESHED_*` environment variables), validated
//! once at client construction, and immutable afterward.

use std::time::Duration;

use crate::error::{Result, UnmeshedError};

/// Per-handler poll requests are never larger than this, regardless of
/// available permits or the configured batch size.
pub const MAX_POLL_BATCH_SIZE: usize = 5000;

const DEFAULT_PERMANENT_ERROR_KEYWORDS: [&str; 2] = [
    "Invalid request, step is not in RUNNING state",
    "please poll the latest and update",
];

/// Configuration for the Unmeshed client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client identifier issued by the engine (required)
    pub client_id: String,
    /// API token paired with the client id (required)
    pub auth_token: String,
    /// Base URL of the engine, scheme included (e.g. "http://localhost")
    pub base_url: String,
    /// Port appended to `base_url` when it does not already carry one
    pub port: u16,
    /// HTTP connect timeout
    pub connection_timeout_seconds: u64,
    /// Per-step execution deadline; `0` or values at `i64::MAX` disable it
    pub step_timeout_millis: i64,
    /// Delay before registration and the first poll
    pub initial_delay_millis: u64,
    /// Upper bound on items requested per handler per poll
    pub work_request_batch_size: usize,
    /// Upper bound on responses submitted per bulk request
    pub response_submit_batch_size: usize,
    /// Width of the CPU scheduling domain
    pub fixed_thread_pool_size: usize,
    /// Submission attempts before a response is dropped
    pub max_submit_attempts: u32,
    /// Substrings that classify a submission failure as permanent
    pub permanent_error_keywords: Vec<String>,
    /// When false, `start()` is a no-op: no polling, no submitting
    pub enable_batch_processing: bool,
    /// Pacing between poll iterations
    pub poll_interval_millis: u64,
    /// Pacing between submission drains
    pub submit_interval_millis: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            auth_token: String::new(),
            base_url: "http://localhost".to_string(),
            port: 8080,
            connection_timeout_seconds: 10,
            step_timeout_millis: i64::MAX,
            initial_delay_millis: 200,
            work_request_batch_size: 10,
            response_submit_batch_size: 1000,
            fixed_thread_pool_size: 2,
            max_submit_attempts: 10,
            permanent_error_keywords: DEFAULT_PERMANENT_ERROR_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            enable_batch_processing: true,
            poll_interval_millis: 100,
            submit_interval_millis: 100,
        }
    }
}

impl ClientConfig {
    /// New configuration with the required credentials and defaults for the rest
    pub fn new(client_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            auth_token: auth_token.into(),
            ..Self::default()
        }
    }

    /// Read configuration from `UNMESHED_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }
        fn parse<T: std::str::FromStr>(name: &str) -> Option<T> {
            var(name).and_then(|v| v.parse().ok())
        }

        let mut config = Self::default();
        if let Some(v) = var("UNMESHED_CLIENT_ID") {
            config.client_id = v;
        }
        if let Some(v) = var("UNMESHED_AUTH_TOKEN") {
            config.auth_token = v;
        }
        if let Some(v) = var("UNMESHED_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = parse("UNMESHED_PORT") {
            config.port = v;
        }
        if let Some(v) = parse("UNMESHED_CONNECTION_TIMEOUT_SECONDS") {
            config.connection_timeout_seconds = v;
        }
        if let Some(v) = parse("UNMESHED_STEP_TIMEOUT_MILLIS") {
            config.step_timeout_millis = v;
        }
        if let Some(v) = parse("UNMESHED_INITIAL_DELAY_MILLIS") {
            config.initial_delay_millis = v;
        }
        if let Some(v) = parse("UNMESHED_WORK_REQUEST_BATCH_SIZE") {
            config.work_request_batch_size = v;
        }
        if let Some(v) = parse("UNMESHED_RESPONSE_SUBMIT_BATCH_SIZE") {
            config.response_submit_batch_size = v;
        }
        if let Some(v) = parse("UNMESHED_FIXED_THREAD_POOL_SIZE") {
            config.fixed_thread_pool_size = v;
        }
        if let Some(v) = parse("UNMESHED_MAX_SUBMIT_ATTEMPTS") {
            config.max_submit_attempts = v;
        }
        if let Some(v) = parse("UNMESHED_ENABLE_BATCH_PROCESSING") {
            config.enable_batch_processing = v;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_step_timeout_millis(mut self, millis: i64) -> Self {
        self.step_timeout_millis = millis;
        self
    }

    pub fn with_initial_delay_millis(mut self, millis: u64) -> Self {
        self.initial_delay_millis = millis;
        self
    }

    pub fn with_work_request_batch_size(mut self, size: usize) -> Self {
        self.work_request_batch_size = size;
        self
    }

    pub fn with_response_submit_batch_size(mut self, size: usize) -> Self {
        self.response_submit_batch_size = size;
        self
    }

    pub fn with_fixed_thread_pool_size(mut self, size: usize) -> Self {
        self.fixed_thread_pool_size = size;
        self
    }

    pub fn with_max_submit_attempts(mut self, attempts: u32) -> Self {
        self.max_submit_attempts = attempts;
        self
    }

    pub fn with_permanent_error_keywords(mut self, keywords: Vec<String>) -> Self {
        self.permanent_error_keywords = keywords;
        self
    }

    pub fn with_enable_batch_processing(mut self, enabled: bool) -> Self {
        self.enable_batch_processing = enabled;
        self
    }

    pub fn with_poll_interval_millis(mut self, millis: u64) -> Self {
        self.poll_interval_millis = millis;
        self
    }

    pub fn with_submit_interval_millis(mut self, millis: u64) -> Self {
        self.submit_interval_millis = millis;
        self
    }

    /// Validate required fields and ranges. Called once at client construction.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(UnmeshedError::Configuration(
                "client_id is required".to_string(),
            ));
        }
        if self.auth_token.is_empty() {
            return Err(UnmeshedError::Configuration(
                "auth_token is required".to_string(),
            ));
        }
        if self.base_url.is_empty() {
            return Err(UnmeshedError::Configuration(
                "base_url must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(UnmeshedError::Configuration(
                "port must be in 1..=65535".to_string(),
            ));
        }
        if self.work_request_batch_size == 0 {
            return Err(UnmeshedError::Configuration(
                "work_request_batch_size must be at least 1".to_string(),
            ));
        }
        if self.response_submit_batch_size == 0 {
            return Err(UnmeshedError::Configuration(
                "response_submit_batch_size must be at least 1".to_string(),
            ));
        }
        if self.fixed_thread_pool_size == 0 {
            return Err(UnmeshedError::Configuration(
                "fixed_thread_pool_size must be at least 1".to_string(),
            ));
        }
        if self.max_submit_attempts == 0 {
            return Err(UnmeshedError::Configuration(
                "max_submit_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Fully composed server URL. The port is appended only when the base URL
    /// is plain HTTP and does not already name one.
    pub fn server_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.starts_with("https:") || authority_has_port(base) {
            base.to_string()
        } else {
            format!("{base}:{}", self.port)
        }
    }

    /// Step deadline, or `None` when the configured value means "never"
    pub fn step_timeout(&self) -> Option<Duration> {
        if self.step_timeout_millis <= 0 || self.step_timeout_millis >= i64::MAX {
            None
        } else {
            Some(Duration::from_millis(self.step_timeout_millis as u64))
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

fn authority_has_port(url: &str) -> bool {
    let authority = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("");
    match authority.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
