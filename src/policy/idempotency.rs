//! Idempotency policies: which mutations are safe to send more than once.

use crate::mutation::{Mutation, SingleRowMutation};
use std::fmt;

/// Decides whether resending a mutation after a failure is safe.
pub trait IdempotentMutationPolicy: Send + Sync + fmt::Debug {
    fn clone_box(&self) -> Box<dyn IdempotentMutationPolicy>;

    fn is_idempotent(&self, mutation: &Mutation) -> bool;

    /// A row is applied atomically, so one non-idempotent mutation makes the
    /// whole row non-idempotent.
    fn is_row_idempotent(&self, row: &SingleRowMutation) -> bool {
        row.mutations().iter().all(|m| self.is_idempotent(m))
    }
}

/// Only retries mutations whose effect does not depend on when they are
/// applied: `SetCell` with an explicit timestamp and every delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeIdempotentMutationPolicy;

impl IdempotentMutationPolicy for SafeIdempotentMutationPolicy {
    fn clone_box(&self) -> Box<dyn IdempotentMutationPolicy> {
        Box::new(*self)
    }

    fn is_idempotent(&self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::SetCell { timestamp, .. } => !timestamp.is_server_assigned(),
            _ => mutation.is_delete(),
        }
    }
}

/// Treats every mutation as safe to retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetryMutationPolicy;

impl IdempotentMutationPolicy for AlwaysRetryMutationPolicy {
    fn clone_box(&self) -> Box<dyn IdempotentMutationPolicy> {
        Box::new(*self)
    }

    fn is_idempotent(&self, _mutation: &Mutation) -> bool {
        true
    }
}
