//! Retry policies: decide whether another attempt is allowed after a failure.

use super::Prototype;
use crate::core::{CallContext, DEFAULT_RETRYABLE_CODES, Status, StatusCode};
use std::fmt;
use std::time::{Duration, Instant};

/// Decides whether a failed attempt may be retried.
///
/// Implementations must be monotonic: once `is_exhausted()` returns `true`
/// it keeps returning `true`, and `on_failure()` keeps returning `false`.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// A new instance with the same configuration and reset counters.
    fn clone_box(&self) -> Box<dyn RetryPolicy>;

    /// Adjusts the context of an attempt before it starts.
    fn setup(&self, _ctx: &mut CallContext) {}

    /// Records a failure; returns `true` if another attempt is allowed.
    fn on_failure(&mut self, status: &Status) -> bool;

    fn is_exhausted(&self) -> bool;

    fn is_permanent_failure(&self, status: &Status) -> bool;
}

impl RetryPolicy for Box<dyn RetryPolicy> {
    fn clone_box(&self) -> Box<dyn RetryPolicy> {
        (**self).clone_box()
    }

    fn setup(&self, ctx: &mut CallContext) {
        (**self).setup(ctx)
    }

    fn on_failure(&mut self, status: &Status) -> bool {
        (**self).on_failure(status)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn is_permanent_failure(&self, status: &Status) -> bool {
        (**self).is_permanent_failure(status)
    }
}

impl Prototype for Box<dyn RetryPolicy> {
    fn fresh(&self) -> Self {
        self.clone_box()
    }
}

fn is_permanent(retryable: &[StatusCode], status: &Status) -> bool {
    !status.is_ok() && !retryable.contains(&status.code())
}

/// Retries until more than `maximum_failures` transient failures were seen.
#[derive(Debug, Clone)]
pub struct LimitedErrorCountRetryPolicy {
    maximum_failures: u32,
    failure_count: u32,
    retryable: Vec<StatusCode>,
}

impl LimitedErrorCountRetryPolicy {
    pub fn new(maximum_failures: u32) -> Self {
        Self {
            maximum_failures,
            failure_count: 0,
            retryable: DEFAULT_RETRYABLE_CODES.to_vec(),
        }
    }

    /// Replaces the set of codes treated as transient.
    pub fn with_retryable_codes(mut self, codes: impl IntoIterator<Item = StatusCode>) -> Self {
        self.retryable = codes.into_iter().collect();
        self
    }

    pub fn maximum_failures(&self) -> u32 {
        self.maximum_failures
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }
}

impl Prototype for LimitedErrorCountRetryPolicy {
    fn fresh(&self) -> Self {
        Self {
            maximum_failures: self.maximum_failures,
            failure_count: 0,
            retryable: self.retryable.clone(),
        }
    }
}

impl RetryPolicy for LimitedErrorCountRetryPolicy {
    fn clone_box(&self) -> Box<dyn RetryPolicy> {
        Box::new(self.fresh())
    }

    fn on_failure(&mut self, status: &Status) -> bool {
        if self.is_permanent_failure(status) {
            return false;
        }
        self.failure_count = self.failure_count.saturating_add(1);
        self.failure_count <= self.maximum_failures
    }

    fn is_exhausted(&self) -> bool {
        self.failure_count > self.maximum_failures
    }

    fn is_permanent_failure(&self, status: &Status) -> bool {
        is_permanent(&self.retryable, status)
    }
}

/// Retries transient failures until `maximum_duration` has elapsed since the
/// policy instance was created.
///
/// A duration too large to represent as an instant (e.g. `Duration::MAX`)
/// leaves the policy without a deadline.
#[derive(Debug, Clone)]
pub struct LimitedTimeRetryPolicy {
    maximum_duration: Duration,
    deadline: Option<Instant>,
    retryable: Vec<StatusCode>,
}

impl LimitedTimeRetryPolicy {
    pub fn new(maximum_duration: Duration) -> Self {
        Self {
            maximum_duration,
            deadline: Instant::now().checked_add(maximum_duration),
            retryable: DEFAULT_RETRYABLE_CODES.to_vec(),
        }
    }

    pub fn with_retryable_codes(mut self, codes: impl IntoIterator<Item = StatusCode>) -> Self {
        self.retryable = codes.into_iter().collect();
        self
    }

    pub fn maximum_duration(&self) -> Duration {
        self.maximum_duration
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Prototype for LimitedTimeRetryPolicy {
    fn fresh(&self) -> Self {
        Self {
            maximum_duration: self.maximum_duration,
            deadline: Instant::now().checked_add(self.maximum_duration),
            retryable: self.retryable.clone(),
        }
    }
}

impl RetryPolicy for LimitedTimeRetryPolicy {
    fn clone_box(&self) -> Box<dyn RetryPolicy> {
        Box::new(self.fresh())
    }

    fn setup(&self, ctx: &mut CallContext) {
        if let Some(deadline) = self.deadline {
            ctx.set_deadline(deadline);
        }
    }

    fn on_failure(&mut self, status: &Status) -> bool {
        if self.is_permanent_failure(status) {
            return false;
        }
        !self.is_exhausted()
    }

    fn is_exhausted(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn is_permanent_failure(&self, status: &Status) -> bool {
        is_permanent(&self.retryable, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_count_allows_exactly_max_failures() {
        let mut policy = LimitedErrorCountRetryPolicy::new(3);
        for _ in 0..3 {
            assert!(policy.on_failure(&Status::unavailable("try again")));
            assert!(!policy.is_exhausted());
        }
        assert!(!policy.on_failure(&Status::unavailable("try again")));
        assert!(policy.is_exhausted());
        // monotonic
        assert!(!policy.on_failure(&Status::aborted("try again")));
        assert!(policy.is_exhausted());
    }

    #[test_case(StatusCode::InvalidArgument)]
    #[test_case(StatusCode::PermissionDenied)]
    #[test_case(StatusCode::NotFound)]
    #[test_case(StatusCode::FailedPrecondition)]
    #[test_case(StatusCode::OutOfRange)]
    fn test_error_count_rejects_permanent(code: StatusCode) {
        let mut policy = LimitedErrorCountRetryPolicy::new(3);
        let status = Status::new(code, "no");
        assert!(policy.is_permanent_failure(&status));
        assert!(!policy.on_failure(&status));
        // a permanent failure does not consume the budget
        assert_eq!(policy.failure_count(), 0);
        assert!(!policy.is_exhausted());
    }

    #[test]
    fn test_custom_retryable_codes() {
        let mut policy = LimitedErrorCountRetryPolicy::new(3)
            .with_retryable_codes([StatusCode::Unavailable]);
        assert!(policy.is_permanent_failure(&Status::aborted("conflict")));
        assert!(!policy.on_failure(&Status::aborted("conflict")));
        assert!(policy.on_failure(&Status::unavailable("try again")));
    }

    #[test]
    fn test_clone_box_resets_counters() {
        let mut policy = LimitedErrorCountRetryPolicy::new(1);
        assert!(policy.on_failure(&Status::unavailable("try again")));
        assert!(!policy.on_failure(&Status::unavailable("try again")));
        assert!(policy.is_exhausted());

        let mut fresh = policy.clone_box();
        assert!(!fresh.is_exhausted());
        assert!(fresh.on_failure(&Status::unavailable("try again")));
    }

    #[test]
    fn test_limited_time_retries_until_deadline() {
        let mut policy = LimitedTimeRetryPolicy::new(Duration::from_millis(50));
        assert!(policy.on_failure(&Status::unavailable("try again")));
        assert!(!policy.is_exhausted());

        std::thread::sleep(Duration::from_millis(60));
        assert!(policy.is_exhausted());
        assert!(!policy.on_failure(&Status::unavailable("try again")));
    }

    #[test]
    fn test_limited_time_rejects_permanent() {
        let mut policy = LimitedTimeRetryPolicy::new(Duration::from_secs(60));
        assert!(!policy.on_failure(&Status::permission_denied("no")));
        assert!(!policy.is_exhausted());
    }

    #[test]
    fn test_limited_time_sets_deadline() {
        let policy = LimitedTimeRetryPolicy::new(Duration::from_secs(60));
        let mut ctx = CallContext::new();
        policy.setup(&mut ctx);
        assert!(policy.deadline().is_some());
        assert_eq!(ctx.deadline(), policy.deadline());
    }

    #[test]
    fn test_limited_time_unrepresentable_duration_has_no_deadline() {
        let mut policy = LimitedTimeRetryPolicy::new(Duration::MAX);
        assert_eq!(policy.deadline(), None);
        assert!(!policy.is_exhausted());
        assert!(policy.on_failure(&Status::unavailable("try again")));
        assert!(!policy.on_failure(&Status::permission_denied("no")));

        let mut ctx = CallContext::new();
        policy.setup(&mut ctx);
        assert_eq!(ctx.deadline(), None);

        let fresh = policy.clone_box();
        assert!(!fresh.is_exhausted());
    }

    #[test]
    fn test_limited_time_clone_restarts_clock() {
        let policy = LimitedTimeRetryPolicy::new(Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(30));
        assert!(policy.is_exhausted());
        let fresh = policy.clone_box();
        assert!(!fresh.is_exhausted());
    }
}
