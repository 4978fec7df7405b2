// ============================================================================
// Bulk Mutations
// ============================================================================
//
// A bulk apply sends many row mutations in one `MutateRows` stream and
// retries only what is left: entries that failed transiently and are safe to
// resend, or whose result the stream never delivered. Entries that cannot be
// retried are reported back with their position in the caller's batch.
//
// ============================================================================

pub mod mutator;
pub mod state;

pub use mutator::BulkMutator;
pub use state::{BulkMutatorState, MutationOutcome};
