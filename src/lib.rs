// ============================================================================
// tablemut Library
// ============================================================================

//! Retrying mutation client for wide-column tables.
//!
//! The crate sits between application code and an injected RPC transport
//! (the stub traits in [`rpc`]) and adds the retry behavior a production
//! client needs:
//!
//! - [`Table::bulk_apply`] sends a batch of row mutations and retries only
//!   the entries that failed transiently and are safe to resend. Entries that
//!   could not be applied come back with their index in the caller's batch.
//! - [`Table::apply`] retries a single-row mutation when it is idempotent.
//! - [`longrunning`] polls server-side operations to completion under a
//!   polling policy, with cancellable handles.
//! - [`policy`] holds the retry, backoff, idempotency and polling policies;
//!   [`config::ClientOptions`] describes them as serializable settings.
//!
//! Async calls run on a Tokio runtime through a [`CompletionQueue`];
//! [`blocking::Table`] offers the same operations without one.

pub mod admin;
pub mod blocking;
pub mod bulk;
pub mod config;
pub mod core;
pub mod executor;
pub mod longrunning;
pub mod mutation;
pub mod policy;
pub mod retry_loop;
pub mod rpc;
pub mod table;

pub use admin::TableAdmin;
pub use bulk::{BulkMutator, BulkMutatorState};
pub use config::ClientOptions;
pub use crate::core::{CallContext, Error, Result, Status, StatusCode};
pub use executor::CompletionQueue;
pub use longrunning::{PollFuture, poll_started_operation, start_long_running_poll};
pub use mutation::{BulkMutation, FailedMutation, Mutation, SingleRowMutation};
pub use table::Table;
