//! In-process stub engine for integration tests: the three client endpoints
//! with scriptable responses and recorded request bodies.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use unmeshed_client::ClientConfig;

#[derive(Default)]
pub struct EngineState {
    pub register_bodies: Vec<Value>,
    pub register_replies: VecDeque<(u16, String)>,
    pub poll_bodies: Vec<Value>,
    pub poll_responses: VecDeque<Value>,
    pub bulk_bodies: Vec<Value>,
    pub bulk_replies: VecDeque<(u16, String)>,
}

type SharedState = Arc<Mutex<EngineState>>;

pub struct StubEngine {
    pub state: SharedState,
    addr: SocketAddr,
}

/// Emit the crate's tracing events during test runs; `RUST_LOG` filters them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl StubEngine {
    pub async fn start() -> Self {
        init_tracing();
        let state: SharedState = Arc::new(Mutex::new(EngineState::default()));
        let app = Router::new()
            .route("/api/clients/register", put(register))
            .route("/api/clients/poll", post(poll))
            .route("/api/clients/bulkResults", post(bulk_results))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { state, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    /// Script the next registration reply; unscripted registrations get 200.
    pub fn enqueue_register_reply(&self, status: u16, body: &str) {
        self.state
            .lock()
            .unwrap()
            .register_replies
            .push_back((status, body.to_string()));
    }

    /// Script the next poll response; unscripted polls return an empty list.
    pub fn enqueue_poll_response(&self, items: Value) {
        self.state.lock().unwrap().poll_responses.push_back(items);
    }

    /// Script the next bulk-results reply; unscripted submissions get 200.
    pub fn enqueue_bulk_reply(&self, status: u16, body: &str) {
        self.state
            .lock()
            .unwrap()
            .bulk_replies
            .push_back((status, body.to_string()));
    }

    pub fn register_count(&self) -> usize {
        self.state.lock().unwrap().register_bodies.len()
    }

    pub fn bulk_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().bulk_bodies.clone()
    }

    /// Flattened responses across every recorded bulk submission
    pub fn submitted_responses(&self) -> Vec<Value> {
        self.bulk_bodies()
            .iter()
            .flat_map(|body| body.as_array().cloned().unwrap_or_default())
            .collect()
    }

    /// Per recorded poll request: the (namespace, name, size) entries
    pub fn poll_sizes(&self) -> Vec<Vec<(String, String, u64)>> {
        self.state
            .lock()
            .unwrap()
            .poll_bodies
            .iter()
            .map(|body| {
                body.as_array()
                    .unwrap()
                    .iter()
                    .map(|entry| {
                        (
                            entry["stepQueueNameData"]["namespace"]
                                .as_str()
                                .unwrap()
                                .to_string(),
                            entry["stepQueueNameData"]["name"]
                                .as_str()
                                .unwrap()
                                .to_string(),
                            entry["size"].as_u64().unwrap(),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

async fn register(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let mut state = state.lock().unwrap();
    state.register_bodies.push(body);
    let (status, body) = state
        .register_replies
        .pop_front()
        .unwrap_or((200, String::new()));
    (StatusCode::from_u16(status).unwrap(), body)
}

async fn poll(State(state): State<SharedState>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.poll_bodies.push(body);
    let response = state
        .poll_responses
        .pop_front()
        .unwrap_or_else(|| json!([]));
    Json(response)
}

async fn bulk_results(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let mut state = state.lock().unwrap();
    state.bulk_bodies.push(body);
    let (status, body) = state
        .bulk_replies
        .pop_front()
        .unwrap_or((200, String::new()));
    (StatusCode::from_u16(status).unwrap(), body)
}

/// Fast-paced client configuration pointed at the stub
pub fn test_config(engine: &StubEngine) -> ClientConfig {
    ClientConfig::new("test-client", "test-token")
        .with_base_url(engine.base_url())
        .with_initial_delay_millis(0)
        .with_poll_interval_millis(10)
        .with_submit_interval_millis(10)
}

/// A poll-response work item with the given identity and input
pub fn work_item(step_execution_id: i64, name: &str, input: Value) -> Value {
    json!({
        "stepId": 1,
        "processId": 2,
        "stepExecutionId": step_execution_id,
        "runCount": 1,
        "stepName": name,
        "stepNamespace": "default",
        "inputParam": input,
        "polled": 1,
        "started": 0,
        "scheduled": 0,
        "updated": 0,
        "priority": 0
    })
}

/// Poll `predicate` until it holds or `deadline` passes
pub async fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
