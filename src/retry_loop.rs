//! Retry loop for calls that issue a single RPC per attempt.
//!
//! A call is retried only when it is idempotent, the failure is transient and
//! the retry policy still allows it. Between attempts the loop waits for the
//! backoff delay: on a [`CompletionQueue`] timer in the async variant, by
//! sleeping the calling thread in the blocking one.

use crate::core::{CallContext, Error, Result, Status};
use crate::executor::CompletionQueue;
use crate::policy::{BackoffPolicy, RetryPolicy};
use std::future::Future;
use tracing::{Level, event};

/// Whether an RPC may safely be sent more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    NonIdempotent,
}

impl From<bool> for Idempotency {
    fn from(idempotent: bool) -> Self {
        if idempotent {
            Idempotency::Idempotent
        } else {
            Idempotency::NonIdempotent
        }
    }
}

/// Settles a failed attempt: `Ok(())` to retry, `Err` to stop.
fn on_attempt_failure(
    retry: &mut dyn RetryPolicy,
    idempotency: Idempotency,
    location: &str,
    attempts: u32,
    status: Status,
) -> Result<()> {
    if retry.is_permanent_failure(&status) {
        return Err(Error::Rpc(status));
    }
    if idempotency == Idempotency::NonIdempotent {
        return Err(Error::NonIdempotent {
            location: location.to_string(),
            status,
        });
    }
    if !retry.on_failure(&status) {
        return Err(Error::RetryExhausted {
            location: location.to_string(),
            attempts,
            last: status,
        });
    }
    Ok(())
}

fn attempt_context(
    base: &CallContext,
    retry: &dyn RetryPolicy,
    backoff: &dyn BackoffPolicy,
) -> CallContext {
    let mut ctx = base.clone();
    retry.setup(&mut ctx);
    backoff.setup(&mut ctx);
    ctx
}

/// Runs `call` until it succeeds or the policies say stop.
///
/// `retry` and `backoff` must be per-call instances.
pub async fn retry_unary<T, F, Fut>(
    cq: &CompletionQueue,
    mut retry: Box<dyn RetryPolicy>,
    mut backoff: Box<dyn BackoffPolicy>,
    idempotency: Idempotency,
    location: &str,
    base: &CallContext,
    mut call: F,
) -> Result<T>
where
    F: FnMut(CallContext) -> Fut,
    Fut: Future<Output = std::result::Result<T, Status>>,
{
    let mut attempts = 0u32;
    loop {
        let ctx = attempt_context(base, &*retry, &*backoff);
        attempts += 1;
        let status = match call(ctx).await {
            Ok(value) => return Ok(value),
            Err(status) => status,
        };

        if let Err(err) = on_attempt_failure(&mut *retry, idempotency, location, attempts, status) {
            event!(Level::ERROR, location, attempts, error = %err, "unary call failed");
            return Err(err);
        }
        let delay = backoff.on_completion();
        event!(
            Level::DEBUG,
            location,
            attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying unary call"
        );
        cq.make_relative_timer(delay).await;
    }
}

/// Blocking variant of [`retry_unary`]; sleeps the calling thread between
/// attempts.
pub fn retry_unary_blocking<T, F>(
    mut retry: Box<dyn RetryPolicy>,
    mut backoff: Box<dyn BackoffPolicy>,
    idempotency: Idempotency,
    location: &str,
    base: &CallContext,
    mut call: F,
) -> Result<T>
where
    F: FnMut(CallContext) -> std::result::Result<T, Status>,
{
    let mut attempts = 0u32;
    loop {
        let ctx = attempt_context(base, &*retry, &*backoff);
        attempts += 1;
        let status = match call(ctx) {
            Ok(value) => return Ok(value),
            Err(status) => status,
        };

        on_attempt_failure(&mut *retry, idempotency, location, attempts, status)?;
        let delay = backoff.on_completion();
        log::warn!(
            "{} failed on attempt {}, retrying in {}ms",
            location,
            attempts,
            delay.as_millis()
        );
        std::thread::sleep(delay);
    }
}
