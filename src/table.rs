// ============================================================================
// Table Client
// ============================================================================

use crate::bulk::BulkMutator;
use crate::config::ClientOptions;
use crate::core::context::routing_params;
use crate::core::{CallContext, REQUEST_PARAMS_HEADER, Result};
use crate::executor::CompletionQueue;
use crate::mutation::{BulkMutation, SingleRowMutation};
use crate::policy::{BackoffPolicy, IdempotentMutationPolicy, RetryPolicy};
use crate::retry_loop::{Idempotency, retry_unary};
use crate::rpc::{DataStub, MutateRowRequest};
use std::sync::Arc;

/// Writes to one table.
///
/// Cloning is cheap; clones share the stub and the policy prototypes, and
/// every call takes fresh policy instances from the prototypes.
///
/// # Examples
///
/// ```ignore
/// let table = Table::new(stub, CompletionQueue::current(), &options, "events")?;
///
/// let batch = BulkMutation::new()
///     .with(SingleRowMutation::new("row-1", vec![Mutation::set_cell("fam", "col", 0, "v")]))
///     .with(SingleRowMutation::new("row-2", vec![Mutation::delete_from_row()]));
///
/// if let Err(err) = table.bulk_apply(batch).await {
///     for failed in err.failures() {
///         eprintln!("row #{} failed: {}", failed.original_index(), failed.status());
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    stub: Arc<dyn DataStub>,
    cq: CompletionQueue,
    table_name: String,
    app_profile_id: String,
    retry: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn BackoffPolicy>,
    idempotency: Arc<dyn IdempotentMutationPolicy>,
}

impl Table {
    pub fn new(
        stub: Arc<dyn DataStub>,
        cq: CompletionQueue,
        options: &ClientOptions,
        table_id: &str,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            stub,
            cq,
            table_name: options.table_name(table_id),
            app_profile_id: options.app_profile_id.clone(),
            retry: Arc::from(options.retry.build()),
            backoff: Arc::new(options.backoff.build()?),
            idempotency: Arc::from(options.idempotency.build()),
        })
    }

    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Arc::new(policy);
        self
    }

    pub fn with_backoff_policy(mut self, policy: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Arc::new(policy);
        self
    }

    pub fn with_idempotency_policy(
        mut self,
        policy: impl IdempotentMutationPolicy + 'static,
    ) -> Self {
        self.idempotency = Arc::new(policy);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn app_profile_id(&self) -> &str {
        &self.app_profile_id
    }

    fn call_context(&self) -> CallContext {
        let mut ctx = CallContext::new();
        ctx.add_metadata(
            REQUEST_PARAMS_HEADER,
            routing_params(&self.table_name, &self.app_profile_id),
        );
        ctx
    }

    /// Applies the mutations of one row atomically.
    ///
    /// Retried only if every mutation of the row is idempotent.
    pub async fn apply(&self, mutation: SingleRowMutation) -> Result<()> {
        let idempotency = Idempotency::from(self.idempotency.is_row_idempotent(&mutation));
        let request = MutateRowRequest {
            table_name: self.table_name.clone(),
            app_profile_id: self.app_profile_id.clone(),
            mutation,
        };
        let stub = &self.stub;

        retry_unary(
            &self.cq,
            self.retry.clone_box(),
            self.backoff.clone_box(),
            idempotency,
            "Table::apply",
            &self.call_context(),
            |ctx| {
                let request = request.clone();
                async move { stub.mutate_row(&ctx, request).await }
            },
        )
        .await
    }

    /// Applies many row mutations, retrying only the entries that can still
    /// succeed.
    ///
    /// On failure the error lists every entry that did not succeed, with its
    /// index in `mutations`; all other entries were applied.
    pub async fn bulk_apply(&self, mutations: BulkMutation) -> Result<()> {
        BulkMutator::new(
            self.table_name.clone(),
            self.app_profile_id.clone(),
            mutations,
            &*self.idempotency,
            self.retry.clone_box(),
            self.backoff.clone_box(),
        )
        .with_context(self.call_context())
        .run(&self.cq, &*self.stub)
        .await
    }
}
