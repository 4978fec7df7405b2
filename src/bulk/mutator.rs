use super::state::BulkMutatorState;
use crate::core::{CallContext, Result, Status};
use crate::executor::CompletionQueue;
use crate::mutation::BulkMutation;
use crate::policy::{BackoffPolicy, IdempotentMutationPolicy, RetryPolicy};
use crate::rpc::{BlockingDataStub, DataStub, MutateRowsRequest};
use futures::StreamExt;
use tracing::{Instrument, Level, event, info_span};

/// Applies a batch of row mutations through repeated `MutateRows` calls.
///
/// A mutator runs once: [`run`](Self::run) and
/// [`run_blocking`](Self::run_blocking) consume it. The retry and backoff
/// policies it holds must be per-call instances.
#[derive(Debug)]
pub struct BulkMutator {
    state: BulkMutatorState,
    retry: Box<dyn RetryPolicy>,
    backoff: Box<dyn BackoffPolicy>,
    base: CallContext,
    attempts: u32,
}

/// What the driver does after a round.
enum Next {
    Done,
    Exhausted,
    Wait(std::time::Duration),
}

impl BulkMutator {
    pub fn new(
        table_name: impl Into<String>,
        app_profile_id: impl Into<String>,
        mutations: BulkMutation,
        idempotency: &dyn IdempotentMutationPolicy,
        retry: Box<dyn RetryPolicy>,
        backoff: Box<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            state: BulkMutatorState::new(table_name, app_profile_id, mutations, idempotency),
            retry,
            backoff,
            base: CallContext::new(),
            attempts: 0,
        }
    }

    /// Context every attempt starts from, e.g. with routing metadata.
    pub fn with_context(mut self, base: CallContext) -> Self {
        self.base = base;
        self
    }

    pub fn state(&self) -> &BulkMutatorState {
        &self.state
    }

    fn attempt_context(&self) -> CallContext {
        let mut ctx = self.base.clone();
        self.retry.setup(&mut ctx);
        self.backoff.setup(&mut ctx);
        ctx
    }

    fn next_request(&mut self) -> Option<(CallContext, MutateRowsRequest)> {
        let request = self.state.before_start()?;
        self.attempts += 1;
        event!(
            Level::DEBUG,
            attempt = self.attempts,
            entries = request.entries.len(),
            "sending MutateRows"
        );
        Some((self.attempt_context(), request))
    }

    fn after_round(&mut self, finish: Status) -> Next {
        let round = self.state.on_finish(finish);
        if !self.state.has_pending() {
            return Next::Done;
        }
        if !self.retry.on_failure(&round) {
            if self.retry.is_permanent_failure(&round) {
                event!(Level::ERROR, status = %round, "MutateRows failed permanently");
                return Next::Done;
            }
            event!(
                Level::ERROR,
                attempts = self.attempts,
                pending = self.state.pending_count(),
                status = %round,
                "retry policy exhausted with mutations pending"
            );
            return Next::Exhausted;
        }
        let delay = self.backoff.on_completion();
        event!(
            Level::WARN,
            attempt = self.attempts,
            pending = self.state.pending_count(),
            delay_ms = delay.as_millis() as u64,
            status = %round,
            "retrying pending mutations"
        );
        Next::Wait(delay)
    }

    fn finish(self, exhausted: bool) -> Result<()> {
        let attempts = self.attempts;
        self.state.into_result(exhausted.then_some(attempts))
    }

    /// Drives the batch to completion, waiting out backoff on `cq`.
    ///
    /// Returns `Ok(())` only if every mutation succeeded. Otherwise the
    /// error is [`Error::PartialFailure`](crate::Error::PartialFailure) and
    /// carries each failed entry with its original index.
    pub async fn run(self, cq: &CompletionQueue, stub: &dyn DataStub) -> Result<()> {
        let span = info_span!(
            "bulk_apply",
            table = %self.state.table_name(),
            mutations = self.state.total()
        );
        self.run_inner(cq, stub).instrument(span).await
    }

    async fn run_inner(mut self, cq: &CompletionQueue, stub: &dyn DataStub) -> Result<()> {
        let mut exhausted = false;
        while let Some((ctx, request)) = self.next_request() {
            let mut stream = stub.mutate_rows(&ctx, request).await;
            let mut finish = Status::ok();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(response) => self.state.on_read(response, &*self.retry),
                    Err(status) => {
                        finish = status;
                        break;
                    }
                }
            }

            match self.after_round(finish) {
                Next::Done => break,
                Next::Exhausted => {
                    exhausted = true;
                    break;
                }
                Next::Wait(delay) => cq.make_relative_timer(delay).await,
            }
        }
        self.finish(exhausted)
    }

    /// Blocking variant of [`run`](Self::run); sleeps the calling thread
    /// between rounds.
    pub fn run_blocking(mut self, stub: &dyn BlockingDataStub) -> Result<()> {
        let span = info_span!(
            "bulk_apply",
            table = %self.state.table_name(),
            mutations = self.state.total()
        );
        let _enter = span.enter();

        let mut exhausted = false;
        while let Some((ctx, request)) = self.next_request() {
            let mut finish = Status::ok();
            for item in stub.mutate_rows(&ctx, request) {
                match item {
                    Ok(response) => self.state.on_read(response, &*self.retry),
                    Err(status) => {
                        finish = status;
                        break;
                    }
                }
            }

            match self.after_round(finish) {
                Next::Done => break,
                Next::Exhausted => {
                    exhausted = true;
                    break;
                }
                Next::Wait(delay) => {
                    log::warn!(
                        "MutateRows attempt {} left {} mutations pending, retrying in {}ms",
                        self.attempts,
                        self.state.pending_count(),
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                }
            }
        }
        self.finish(exhausted)
    }
}
