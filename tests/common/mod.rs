#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tablemut::config::{BackoffConfig, ClientOptions, RetryConfig};
use tablemut::core::REQUEST_PARAMS_HEADER;
use tablemut::policy::{BackoffPolicy, Prototype};
use tablemut::rpc::{
    AdminStub, BlockingDataStub, BlockingMutateRowsStream, DataStub, MutateRowRequest,
    MutateRowsEntry, MutateRowsRequest, MutateRowsResponse, MutateRowsStream, Operation,
    OperationsStub,
};
use tablemut::{CallContext, Mutation, SingleRowMutation, Status};

/// Messages of one `MutateRows` stream; an `Err` ends the stream.
pub type Round = Vec<Result<MutateRowsResponse, Status>>;

pub fn options(max_failures: u32) -> ClientOptions {
    ClientOptions::new("p", "i")
        .retry(RetryConfig::LimitedErrorCount { max_failures })
        .backoff(BackoffConfig {
            initial_delay_ms: 1,
            maximum_delay_ms: 4,
            ..BackoffConfig::default()
        })
}

pub fn idempotent_row(key: &str) -> SingleRowMutation {
    SingleRowMutation::new(key, vec![Mutation::set_cell("fam", "col", 0, "v")])
}

pub fn non_idempotent_row(key: &str) -> SingleRowMutation {
    SingleRowMutation::new(key, vec![Mutation::set_cell_server_time("fam", "col", "v")])
}

pub fn results(entries: &[(usize, Status)]) -> Result<MutateRowsResponse, Status> {
    Ok(MutateRowsResponse::new(
        entries
            .iter()
            .map(|(index, status)| MutateRowsEntry::new(*index, status.clone()))
            .collect(),
    ))
}

/// Data stub replaying one scripted round per `MutateRows` call.
#[derive(Debug, Default)]
pub struct FakeDataStub {
    rounds: Mutex<VecDeque<Round>>,
    row_replies: Mutex<VecDeque<Result<(), Status>>>,
    requests: Mutex<Vec<MutateRowsRequest>>,
    row_requests: Mutex<Vec<MutateRowRequest>>,
    routing: Mutex<Vec<String>>,
}

impl FakeDataStub {
    pub fn with_rounds(rounds: Vec<Round>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
            ..Default::default()
        })
    }

    pub fn with_row_replies(replies: Vec<Result<(), Status>>) -> Arc<Self> {
        Arc::new(Self {
            row_replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<MutateRowsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_keys(&self, attempt: usize) -> Vec<String> {
        self.requests.lock().unwrap()[attempt]
            .entries
            .iter()
            .map(|e| String::from_utf8_lossy(e.row_key()).into_owned())
            .collect()
    }

    pub fn row_requests(&self) -> Vec<MutateRowRequest> {
        self.row_requests.lock().unwrap().clone()
    }

    pub fn routing(&self) -> Vec<String> {
        self.routing.lock().unwrap().clone()
    }

    fn record(&self, ctx: &CallContext) {
        if let Some(value) = ctx.metadata_value(REQUEST_PARAMS_HEADER) {
            self.routing.lock().unwrap().push(value.to_string());
        }
    }

    fn next_round(&self, request: MutateRowsRequest) -> Round {
        self.requests.lock().unwrap().push(request);
        self.rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Err(Status::internal("unexpected MutateRows call"))])
    }

    fn next_row_reply(&self, request: MutateRowRequest) -> Result<(), Status> {
        self.row_requests.lock().unwrap().push(request);
        self.row_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Status::internal("unexpected MutateRow call")))
    }
}

#[async_trait]
impl DataStub for FakeDataStub {
    async fn mutate_row(&self, ctx: &CallContext, request: MutateRowRequest) -> Result<(), Status> {
        self.record(ctx);
        self.next_row_reply(request)
    }

    async fn mutate_rows(&self, ctx: &CallContext, request: MutateRowsRequest) -> MutateRowsStream {
        self.record(ctx);
        futures::stream::iter(self.next_round(request)).boxed()
    }
}

impl BlockingDataStub for FakeDataStub {
    fn mutate_row(&self, ctx: &CallContext, request: MutateRowRequest) -> Result<(), Status> {
        self.record(ctx);
        self.next_row_reply(request)
    }

    fn mutate_rows(&self, ctx: &CallContext, request: MutateRowsRequest) -> BlockingMutateRowsStream {
        self.record(ctx);
        Box::new(self.next_round(request).into_iter())
    }
}

/// Operations stub replaying scripted `GetOperation` replies.
#[derive(Debug, Default)]
pub struct FakeOperations {
    replies: Mutex<VecDeque<Result<Operation, Status>>>,
    hang_when_empty: bool,
    calls: AtomicUsize,
}

impl FakeOperations {
    pub fn new(replies: Vec<Result<Operation, Status>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    /// Never answers once the script runs out.
    pub fn hanging(replies: Vec<Result<Operation, Status>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            hang_when_empty: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationsStub for FakeOperations {
    async fn get_operation(&self, _ctx: &CallContext, name: &str) -> Result<Operation, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply,
            None if self.hang_when_empty => futures::future::pending().await,
            None => Ok(Operation::running(name)),
        }
    }
}

/// Admin stub with scripted token and consistency replies.
#[derive(Debug, Default)]
pub struct FakeAdmin {
    tokens: Mutex<VecDeque<Result<String, Status>>>,
    checks: Mutex<VecDeque<Result<bool, Status>>>,
    check_calls: AtomicUsize,
}

impl FakeAdmin {
    pub fn new(tokens: Vec<Result<String, Status>>, checks: Vec<Result<bool, Status>>) -> Arc<Self> {
        Arc::new(Self {
            tokens: Mutex::new(tokens.into()),
            checks: Mutex::new(checks.into()),
            check_calls: AtomicUsize::new(0),
        })
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminStub for FakeAdmin {
    async fn generate_consistency_token(
        &self,
        _ctx: &CallContext,
        _table_name: &str,
    ) -> Result<String, Status> {
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Status::internal("unexpected call")))
    }

    async fn check_consistency(
        &self,
        _ctx: &CallContext,
        _table_name: &str,
        _token: &str,
    ) -> Result<bool, Status> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.checks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Status::internal("unexpected call")))
    }
}

/// Fixed-delay backoff that counts how often it was asked for a delay.
#[derive(Debug, Clone)]
pub struct CountingBackoff {
    delay: Duration,
    waits: Arc<AtomicUsize>,
}

impl CountingBackoff {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            waits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl Prototype for CountingBackoff {
    fn fresh(&self) -> Self {
        self.clone()
    }
}

impl BackoffPolicy for CountingBackoff {
    fn clone_box(&self) -> Box<dyn BackoffPolicy> {
        Box::new(self.clone())
    }

    fn on_completion(&mut self) -> Duration {
        self.waits.fetch_add(1, Ordering::SeqCst);
        self.delay
    }
}
