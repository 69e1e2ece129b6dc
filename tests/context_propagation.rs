//! Ambient work-item context across concurrent executions and thread hops

mod support;

use std::time::Duration;

use serde_json::{json, Value};
use unmeshed_client::{HandlerEntry, UnmeshedClient, WorkContext};

use support::{test_config, wait_until, StubEngine};

async fn nested_context_read() -> Option<String> {
    tokio::task::yield_now().await;
    WorkContext::current().map(|item| item.step_name)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_execution_observes_only_its_own_work_item() {
    let engine = StubEngine::start().await;

    let items: Vec<Value> = (0..20)
        .map(|i| {
            json!({
                "stepId": i,
                "processId": 2,
                "stepExecutionId": i,
                "runCount": 1,
                "stepName": format!("Step-{i}"),
                "stepNamespace": "default",
                "inputParam": {},
                "polled": true
            })
        })
        .collect();
    engine.enqueue_poll_response(Value::Array(items));

    let mut client = UnmeshedClient::new(test_config(&engine)).unwrap();
    for i in 0..20 {
        client
            .register_handler(HandlerEntry::from_fn(
                "default",
                format!("Step-{i}"),
                |item| async move {
                    // First suspension point, then a nested call with its own.
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let direct = WorkContext::current()
                        .map(|ambient| ambient.step_name)
                        .unwrap_or_default();
                    let nested = nested_context_read().await.unwrap_or_default();
                    assert_eq!(direct, item.step_name);
                    assert_eq!(nested, item.step_name);
                    Ok(json!({"observed": nested}).into())
                },
            ))
            .unwrap();
    }
    client.start().await.unwrap();

    assert!(
        wait_until(Duration::from_secs(10), || engine
            .submitted_responses()
            .len()
            >= 20)
        .await
    );
    for response in engine.submitted_responses() {
        let id = response["stepExecutionId"].as_i64().unwrap();
        assert_eq!(
            response["output"]["observed"],
            format!("Step-{id}"),
            "execution {id} observed a foreign context"
        );
        assert_eq!(response["status"], "COMPLETED");
    }

    client.stop().await.unwrap();
}
