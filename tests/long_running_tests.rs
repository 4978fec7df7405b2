mod common;

use common::{CountingBackoff, FakeAdmin, FakeOperations};
use std::time::Duration;
use tablemut::config::{ClientOptions, PollingConfig, RetryConfig};
use tablemut::policy::{
    ExponentialBackoffPolicy, GenericPollingPolicy, LimitedErrorCountRetryPolicy,
    LimitedTimeRetryPolicy, PollingPolicy,
};
use tablemut::rpc::Operation;
use tablemut::{
    CompletionQueue, Error, Status, StatusCode, TableAdmin, poll_started_operation,
    start_long_running_poll,
};
use tokio_test::{assert_err, assert_ok};

fn decode(payload: &[u8]) -> tablemut::Result<String> {
    String::from_utf8(payload.to_vec()).map_err(|e| Error::Decode(e.to_string()))
}

fn polling(backoff: &CountingBackoff, max_failures: u32) -> Box<dyn PollingPolicy> {
    Box::new(GenericPollingPolicy::new(
        LimitedErrorCountRetryPolicy::new(max_failures),
        backoff.clone(),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_resolves_after_second_poll() {
    let stub = FakeOperations::new(vec![
        Ok(Operation::running("op")),
        Ok(Operation::succeeded("op", "X")),
    ]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let result = start_long_running_poll(&cq, stub.clone(), polling(&backoff, 3), "op", decode).await;

    assert_eq!(assert_ok!(result), "X");
    assert_eq!(stub.calls(), 2);
    assert_eq!(backoff.waits(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_progress_polls_do_not_use_failure_budget() {
    let mut replies: Vec<_> = (0..5).map(|_| Ok(Operation::running("op"))).collect();
    replies.insert(2, Err(Status::unavailable("blip")));
    replies.push(Ok(Operation::succeeded("op", "done")));
    let stub = FakeOperations::new(replies);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let result = start_long_running_poll(&cq, stub.clone(), polling(&backoff, 1), "op", decode).await;

    assert_eq!(assert_ok!(result), "done");
    assert_eq!(stub.calls(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_error_payload_is_not_retried() {
    let stub = FakeOperations::new(vec![
        Ok(Operation::running("op")),
        Ok(Operation::failed("op", Status::failed_precondition("bad state"))),
    ]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let err = assert_err!(
        start_long_running_poll(&cq, stub.clone(), polling(&backoff, 3), "op", decode).await
    );

    match err {
        Error::OperationFailed { name, status } => {
            assert_eq!(name, "op");
            assert_eq!(status.code(), StatusCode::FailedPrecondition);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(stub.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_exhaust_retry_budget() {
    let stub = FakeOperations::new(vec![
        Err(Status::unavailable("x")),
        Err(Status::unavailable("x")),
        Err(Status::unavailable("x")),
    ]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let err = assert_err!(
        start_long_running_poll(&cq, stub.clone(), polling(&backoff, 2), "op", decode).await
    );

    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    assert_eq!(err.status().map(|s| s.code()), Some(StatusCode::Unavailable));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_poll_error_is_reported_as_is() {
    let stub = FakeOperations::new(vec![Err(Status::not_found("no such operation"))]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let err = assert_err!(
        start_long_running_poll(&cq, stub.clone(), polling(&backoff, 5), "op", decode).await
    );

    assert!(matches!(err, Error::Rpc(ref s) if s.code() == StatusCode::NotFound));
    assert_eq!(backoff.waits(), 0);
}

#[tokio::test]
async fn test_expired_polling_policy_stops_on_in_progress() {
    let stub = FakeOperations::new(vec![Ok(Operation::running("op"))]);
    let backoff = ExponentialBackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)).unwrap();
    let polling = Box::new(GenericPollingPolicy::new(
        LimitedTimeRetryPolicy::new(Duration::ZERO),
        backoff,
    ));
    let cq = CompletionQueue::current();

    let err = assert_err!(start_long_running_poll(&cq, stub.clone(), polling, "op", decode).await);

    assert!(matches!(err, Error::PollingExhausted { ref operation, .. } if operation == "op"));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_started_operation_keeps_polling_when_running() {
    let stub = FakeOperations::new(vec![Ok(Operation::succeeded("op", "later"))]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let result = poll_started_operation(
        &cq,
        stub.clone(),
        polling(&backoff, 3),
        Operation::running("op"),
        decode,
    )
    .await;

    assert_eq!(assert_ok!(result), "later");
    assert_eq!(stub.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_resolves_to_cancelled() {
    let stub = FakeOperations::hanging(vec![]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let future = start_long_running_poll(&cq, stub.clone(), polling(&backoff, 3), "op", decode);
    tokio::time::sleep(Duration::from_millis(5)).await;
    future.cancel();

    assert!(matches!(future.await, Err(Error::Cancelled)));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_future_stops_polling() {
    let stub = FakeOperations::new(vec![]);
    let backoff = CountingBackoff::new(Duration::from_millis(10));
    let cq = CompletionQueue::current();

    let future = start_long_running_poll(&cq, stub.clone(), polling(&backoff, 3), "op", decode);
    tokio::time::sleep(Duration::from_millis(35)).await;
    drop(future);
    tokio::task::yield_now().await;
    let polls = stub.calls();
    assert!(polls > 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.calls(), polls);
}

fn admin_options() -> ClientOptions {
    ClientOptions::new("p", "i")
        .retry(RetryConfig::LimitedErrorCount { max_failures: 3 })
        .polling(PollingConfig {
            retry: RetryConfig::LimitedErrorCount { max_failures: 3 },
            ..PollingConfig::default()
        })
}

#[tokio::test(start_paused = true)]
async fn test_consistency_token_is_retried() {
    let stub = FakeAdmin::new(
        vec![Err(Status::unavailable("x")), Ok("token-1".to_string())],
        vec![],
    );
    let admin = TableAdmin::new(stub.clone(), CompletionQueue::current(), &admin_options()).unwrap();

    let token = assert_ok!(admin.generate_consistency_token("t").await);
    assert_eq!(token, "token-1");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_consistency_polls_until_consistent() {
    let stub = FakeAdmin::new(vec![], vec![Ok(false), Err(Status::unavailable("x")), Ok(false), Ok(true)]);
    let admin = TableAdmin::new(stub.clone(), CompletionQueue::current(), &admin_options()).unwrap();

    assert_ok!(admin.wait_for_consistency("t", "token-1").await);
    assert_eq!(stub.check_calls(), 4);
}
