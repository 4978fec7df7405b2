use super::poll_op::{AsyncPollOp, PollAttempt, PollFuture, PollableOperation};
use crate::core::{CallContext, Error, Result, Status};
use crate::executor::CompletionQueue;
use crate::policy::PollingPolicy;
use crate::rpc::{Operation, OperationResult, OperationsStub};
use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{Level, event};

const LOCATION: &str = "LongrunningOperation";

/// Polls `GetOperation` for a named server-side operation and decodes its
/// response payload with `decode`.
pub struct LongrunningOperation<T, F> {
    stub: Arc<dyn OperationsStub>,
    operation: Operation,
    decode: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> fmt::Debug for LongrunningOperation<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongrunningOperation")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl<T, F> LongrunningOperation<T, F>
where
    F: Fn(&[u8]) -> Result<T>,
{
    pub fn new(stub: Arc<dyn OperationsStub>, name: impl Into<String>, decode: F) -> Self {
        Self::from_operation(stub, Operation::running(name), decode)
    }

    /// Continues from the operation returned by the initiating RPC.
    pub fn from_operation(stub: Arc<dyn OperationsStub>, operation: Operation, decode: F) -> Self {
        Self {
            stub,
            operation,
            decode,
            _output: PhantomData,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn is_done(&self) -> bool {
        self.operation.done
    }

    fn take_result(&mut self) -> Result<T> {
        match self.operation.result.take() {
            Some(OperationResult::Response(payload)) => (self.decode)(&payload),
            Some(OperationResult::Error(status)) => Err(Error::OperationFailed {
                name: self.operation.name.clone(),
                status,
            }),
            None => Err(Error::Decode(format!(
                "operation '{}' finished without a result",
                self.operation.name
            ))),
        }
    }
}

#[async_trait]
impl<T, F> PollableOperation for LongrunningOperation<T, F>
where
    T: Send + 'static,
    F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.operation.name
    }

    async fn start(&mut self, ctx: &CallContext) -> std::result::Result<PollAttempt, Status> {
        let mut polled = self.stub.get_operation(ctx, &self.operation.name).await?;
        if polled.name.is_empty() {
            polled.name = self.operation.name.clone();
        }
        self.operation = polled;

        if self.operation.done {
            return Ok(PollAttempt::Done);
        }
        if let Some(metadata) = &self.operation.metadata {
            event!(
                Level::DEBUG,
                operation = %self.operation.name,
                metadata_bytes = metadata.len(),
                "operation in progress"
            );
        }
        Ok(PollAttempt::InProgress)
    }

    fn accumulated_result(&mut self) -> Result<T> {
        self.take_result()
    }
}

/// Polls the operation `name` on `cq` until it finishes.
pub fn start_long_running_poll<T, F>(
    cq: &CompletionQueue,
    stub: Arc<dyn OperationsStub>,
    polling: Box<dyn PollingPolicy>,
    name: impl Into<String>,
    decode: F,
) -> PollFuture<T>
where
    T: Send + 'static,
    F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
{
    AsyncPollOp::new(LOCATION, polling, LongrunningOperation::new(stub, name, decode)).spawn(cq)
}

/// Like [`start_long_running_poll`], starting from the operation the
/// initiating RPC returned. An operation that is already done resolves
/// without any poll.
pub fn poll_started_operation<T, F>(
    cq: &CompletionQueue,
    stub: Arc<dyn OperationsStub>,
    polling: Box<dyn PollingPolicy>,
    operation: Operation,
    decode: F,
) -> PollFuture<T>
where
    T: Send + 'static,
    F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
{
    let mut operation = LongrunningOperation::from_operation(stub, operation, decode);
    if operation.is_done() {
        let result = operation.take_result();
        return PollFuture::new(cq.spawn(async move { result }));
    }
    AsyncPollOp::new(LOCATION, polling, operation).spawn(cq)
}
