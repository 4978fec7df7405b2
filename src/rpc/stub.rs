use super::{MutateRowRequest, MutateRowsRequest, MutateRowsResponse, Operation};
use crate::core::{CallContext, Status};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// Response stream of one `MutateRows` call.
///
/// The stream yields response messages and ends either with `None` (the call
/// finished OK) or with an `Err` carrying the final status. Nothing is read
/// after an `Err`.
pub type MutateRowsStream = BoxStream<'static, Result<MutateRowsResponse, Status>>;

/// Blocking counterpart of [`MutateRowsStream`].
pub type BlockingMutateRowsStream =
    Box<dyn Iterator<Item = Result<MutateRowsResponse, Status>> + Send>;

/// Data-plane calls used by [`Table`](crate::table::Table).
#[async_trait]
pub trait DataStub: Send + Sync + fmt::Debug {
    async fn mutate_row(&self, ctx: &CallContext, request: MutateRowRequest)
    -> Result<(), Status>;

    async fn mutate_rows(&self, ctx: &CallContext, request: MutateRowsRequest)
    -> MutateRowsStream;
}

/// Data-plane calls used by [`blocking::Table`](crate::blocking::Table).
pub trait BlockingDataStub: Send + Sync + fmt::Debug {
    fn mutate_row(&self, ctx: &CallContext, request: MutateRowRequest) -> Result<(), Status>;

    fn mutate_rows(&self, ctx: &CallContext, request: MutateRowsRequest)
    -> BlockingMutateRowsStream;
}

/// Long-running operation lookups.
#[async_trait]
pub trait OperationsStub: Send + Sync + fmt::Debug {
    async fn get_operation(&self, ctx: &CallContext, name: &str) -> Result<Operation, Status>;
}

/// Table administration calls used by [`TableAdmin`](crate::admin::TableAdmin).
#[async_trait]
pub trait AdminStub: Send + Sync + fmt::Debug {
    async fn generate_consistency_token(
        &self,
        ctx: &CallContext,
        table_name: &str,
    ) -> Result<String, Status>;

    /// Returns `true` once every write issued before `token` was generated
    /// has replicated.
    async fn check_consistency(
        &self,
        ctx: &CallContext,
        table_name: &str,
        token: &str,
    ) -> Result<bool, Status>;
}
