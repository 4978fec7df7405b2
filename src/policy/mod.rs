// ============================================================================
// Retry, Backoff, Idempotency and Polling Policies
// ============================================================================
//
// Policies are configured once and used as prototypes: every logical call
// takes its own instance through `clone_box()` (or `Prototype::fresh()`), so
// mutable counters are never shared between concurrent calls and no locking
// is needed around them.
//
// ============================================================================

pub mod backoff;
pub mod idempotency;
pub mod polling;
pub mod retry;

pub use backoff::{BackoffPolicy, ExponentialBackoffPolicy, ExponentialBackoffPolicyBuilder};
pub use idempotency::{
    AlwaysRetryMutationPolicy, IdempotentMutationPolicy, SafeIdempotentMutationPolicy,
};
pub use polling::{GenericPollingPolicy, PollingPolicy};
pub use retry::{LimitedErrorCountRetryPolicy, LimitedTimeRetryPolicy, RetryPolicy};

/// A policy that can produce an instance with the same configuration and
/// freshly reset state.
pub trait Prototype: Sized {
    fn fresh(&self) -> Self;
}
