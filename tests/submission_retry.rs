//! Transient-vs-permanent classification of bulk submission failures

mod support;

use std::time::Duration;

use serde_json::json;
use unmeshed_client::{HandlerEntry, UnmeshedClient};

use support::{test_config, wait_until, work_item, StubEngine};

#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_retry_until_a_permanent_match_retires_the_batch() {
    let engine = StubEngine::start().await;
    engine.enqueue_poll_response(json!([work_item(11, "echo", json!({}))]));
    engine.enqueue_bulk_reply(500, "internal error");
    engine.enqueue_bulk_reply(500, "internal error");
    engine.enqueue_bulk_reply(400, "Invalid request, please poll the latest and update");

    let mut client = UnmeshedClient::new(test_config(&engine)).unwrap();
    client
        .register_handler(HandlerEntry::from_fn("default", "echo", |_| async {
            Ok(json!({}).into())
        }))
        .unwrap();
    client.start().await.unwrap();

    // Two transient retries, then the keyword match retires the tracker.
    assert!(wait_until(Duration::from_secs(5), || engine.bulk_bodies().len() >= 3).await);

    // Retirement releases the permit: polling resumes at full credit.
    let polls_after_retire = engine.poll_sizes().len();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let sizes = engine.poll_sizes();
            sizes.len() > polls_after_retire
                && sizes.last().unwrap()
                    == &[("default".to_string(), "echo".to_string(), 1)]
        })
        .await
    );

    // The tracker is gone; nothing further is submitted.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.bulk_bodies().len(), 3);
    assert_eq!(client.pending_submissions(), 0);

    client.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn attempt_budget_drops_a_response_that_never_goes_through() {
    let engine = StubEngine::start().await;
    engine.enqueue_poll_response(json!([work_item(12, "echo", json!({}))]));
    for _ in 0..3 {
        engine.enqueue_bulk_reply(503, "unavailable");
    }

    let config = test_config(&engine).with_max_submit_attempts(3);
    let mut client = UnmeshedClient::new(config).unwrap();
    client
        .register_handler(HandlerEntry::from_fn("default", "echo", |_| async {
            Ok(json!({}).into())
        }))
        .unwrap();
    client.start().await.unwrap();

    assert!(wait_until(Duration::from_secs(5), || engine.bulk_bodies().len() == 3).await);
    assert!(
        wait_until(Duration::from_secs(5), || client.pending_submissions() == 0).await
    );

    // Out of attempts: the response is dropped, not retried forever.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.bulk_bodies().len(), 3);

    client.stop().await.unwrap();
}
