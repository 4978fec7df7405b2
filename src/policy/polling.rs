//! Polling policies for long-running operations.
//!
//! Two exit conditions govern a polling loop. A poll RPC that fails consumes
//! the failure budget of the retry policy. A poll that succeeds but reports
//! the operation as still running only checks whether the policy has expired.

use super::{BackoffPolicy, Prototype, RetryPolicy};
use crate::core::{CallContext, Status};
use std::fmt;
use std::time::Duration;

pub trait PollingPolicy: Send + Sync + fmt::Debug {
    /// A new instance with the same configuration and reset state.
    fn clone_box(&self) -> Box<dyn PollingPolicy>;

    fn setup(&self, ctx: &mut CallContext);

    /// `true` if the poll RPC failed in a way retrying cannot fix.
    fn is_permanent_error(&self, status: &Status) -> bool;

    /// Records a failed poll RPC; returns `true` if polling may continue.
    fn on_failure(&mut self, status: &Status) -> bool;

    /// Records a successful poll of an unfinished operation; returns `true`
    /// if polling may continue.
    fn on_in_progress(&mut self) -> bool {
        !self.exhausted()
    }

    fn exhausted(&self) -> bool;

    /// Delay before the next poll.
    fn wait_period(&mut self) -> Duration;
}

/// Composes a [`RetryPolicy`] (failure tolerance and overall limit) with a
/// [`BackoffPolicy`] (spacing between polls).
#[derive(Debug)]
pub struct GenericPollingPolicy<R, B> {
    retry: R,
    backoff: B,
}

impl<R, B> GenericPollingPolicy<R, B>
where
    R: RetryPolicy + Prototype + 'static,
    B: BackoffPolicy + Prototype + 'static,
{
    pub fn new(retry: R, backoff: B) -> Self {
        Self { retry, backoff }
    }

    pub fn retry_policy(&self) -> &R {
        &self.retry
    }
}

impl<R, B> Prototype for GenericPollingPolicy<R, B>
where
    R: RetryPolicy + Prototype + 'static,
    B: BackoffPolicy + Prototype + 'static,
{
    fn fresh(&self) -> Self {
        Self {
            retry: self.retry.fresh(),
            backoff: self.backoff.fresh(),
        }
    }
}

impl<R, B> PollingPolicy for GenericPollingPolicy<R, B>
where
    R: RetryPolicy + Prototype + 'static,
    B: BackoffPolicy + Prototype + 'static,
{
    fn clone_box(&self) -> Box<dyn PollingPolicy> {
        Box::new(self.fresh())
    }

    fn setup(&self, ctx: &mut CallContext) {
        self.retry.setup(ctx);
        self.backoff.setup(ctx);
    }

    fn is_permanent_error(&self, status: &Status) -> bool {
        self.retry.is_permanent_failure(status)
    }

    fn on_failure(&mut self, status: &Status) -> bool {
        self.retry.on_failure(status)
    }

    fn exhausted(&self) -> bool {
        self.retry.is_exhausted()
    }

    fn wait_period(&mut self) -> Duration {
        self.backoff.on_completion()
    }
}
