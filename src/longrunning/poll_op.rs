use crate::core::{CallContext, Error, Result, Status};
use crate::executor::CompletionQueue;
use crate::policy::PollingPolicy;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, event, info_span};

/// What one poll RPC learned about the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAttempt {
    Done,
    InProgress,
}

/// An operation that reaches a terminal state through repeated polls.
#[async_trait]
pub trait PollableOperation: Send {
    type Output: Send + 'static;

    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Issues exactly one poll RPC.
    async fn start(&mut self, ctx: &CallContext) -> std::result::Result<PollAttempt, Status>;

    /// Terminal value, available once [`start`](Self::start) reported
    /// [`PollAttempt::Done`].
    fn accumulated_result(&mut self) -> Result<Self::Output>;
}

/// Polls one operation until it finishes or the polling policy gives up.
///
/// At most one poll RPC is outstanding at a time, and the wait between polls
/// is a timer on the [`CompletionQueue`].
#[derive(Debug)]
pub struct AsyncPollOp<Op> {
    location: String,
    polling: Box<dyn PollingPolicy>,
    base: CallContext,
    operation: Op,
    polls: u32,
}

impl<Op> AsyncPollOp<Op>
where
    Op: PollableOperation + 'static,
{
    /// `polling` must be a per-call instance.
    pub fn new(location: impl Into<String>, polling: Box<dyn PollingPolicy>, operation: Op) -> Self {
        Self {
            location: location.into(),
            polling,
            base: CallContext::new(),
            operation,
            polls: 0,
        }
    }

    pub fn with_context(mut self, base: CallContext) -> Self {
        self.base = base;
        self
    }

    pub async fn run(self, cq: &CompletionQueue) -> Result<Op::Output> {
        let span = info_span!(
            "poll_operation",
            location = %self.location,
            operation = %self.operation.name()
        );
        self.run_inner(cq).instrument(span).await
    }

    async fn run_inner(mut self, cq: &CompletionQueue) -> Result<Op::Output> {
        loop {
            let mut ctx = self.base.clone();
            self.polling.setup(&mut ctx);
            self.polls += 1;

            match self.operation.start(&ctx).await {
                Ok(PollAttempt::Done) => {
                    let result = self.operation.accumulated_result();
                    match &result {
                        Ok(_) => event!(Level::INFO, polls = self.polls, "operation completed"),
                        Err(err) => {
                            event!(Level::WARN, polls = self.polls, error = %err, "operation failed")
                        }
                    }
                    return result;
                }
                Ok(PollAttempt::InProgress) => {
                    if !self.polling.on_in_progress() {
                        event!(Level::ERROR, polls = self.polls, "polling policy exhausted");
                        return Err(Error::PollingExhausted {
                            location: self.location,
                            operation: self.operation.name().to_string(),
                        });
                    }
                }
                Err(status) => {
                    if self.polling.is_permanent_error(&status) {
                        event!(Level::ERROR, polls = self.polls, status = %status, "poll failed permanently");
                        return Err(Error::Rpc(status));
                    }
                    if !self.polling.on_failure(&status) {
                        event!(Level::ERROR, polls = self.polls, status = %status, "poll retries exhausted");
                        return Err(Error::RetryExhausted {
                            location: self.location,
                            attempts: self.polls,
                            last: status,
                        });
                    }
                    event!(Level::DEBUG, polls = self.polls, status = %status, "poll failed, retrying");
                }
            }

            let delay = self.polling.wait_period();
            cq.make_relative_timer(delay).await;
        }
    }

    /// Runs the loop as a task on `cq`.
    pub fn spawn(self, cq: &CompletionQueue) -> PollFuture<Op::Output> {
        let task_cq = cq.clone();
        PollFuture::new(cq.spawn(async move { self.run(&task_cq).await }))
    }
}

/// Handle to a spawned polling loop.
///
/// Dropping the handle or calling [`cancel`](Self::cancel) aborts the task,
/// which drops the outstanding poll RPC and any pending timer. Awaiting a
/// cancelled handle yields [`Error::Cancelled`].
#[derive(Debug)]
pub struct PollFuture<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> PollFuture<T> {
    pub(crate) fn new(handle: JoinHandle<Result<T>>) -> Self {
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for PollFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_cancelled() => Poll::Ready(Err(Error::Cancelled)),
            Poll::Ready(Err(err)) => std::panic::resume_unwind(err.into_panic()),
        }
    }
}

impl<T> Drop for PollFuture<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
