//! Blocking table client.
//!
//! Same semantics as [`crate::table::Table`], for callers without an async
//! runtime. Backoff waits put the calling thread to sleep.

use crate::bulk::BulkMutator;
use crate::config::ClientOptions;
use crate::core::context::routing_params;
use crate::core::{CallContext, REQUEST_PARAMS_HEADER, Result};
use crate::mutation::{BulkMutation, SingleRowMutation};
use crate::policy::{BackoffPolicy, IdempotentMutationPolicy, RetryPolicy};
use crate::retry_loop::{Idempotency, retry_unary_blocking};
use crate::rpc::{BlockingDataStub, MutateRowRequest};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Table {
    stub: Arc<dyn BlockingDataStub>,
    table_name: String,
    app_profile_id: String,
    retry: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn BackoffPolicy>,
    idempotency: Arc<dyn IdempotentMutationPolicy>,
}

impl Table {
    pub fn new(
        stub: Arc<dyn BlockingDataStub>,
        options: &ClientOptions,
        table_id: &str,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            stub,
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

    fn call_context(&self) -> CallContext {
        let mut ctx = CallContext::new();
        ctx.add_metadata(
            REQUEST_PARAMS_HEADER,
            routing_params(&self.table_name, &self.app_profile_id),
        );
        ctx
    }

    pub fn apply(&self, mutation: SingleRowMutation) -> Result<()> {
        let idempotency = Idempotency::from(self.idempotency.is_row_idempotent(&mutation));
        let request = MutateRowRequest {
            table_name: self.table_name.clone(),
            app_profile_id: self.app_profile_id.clone(),
            mutation,
        };

        retry_unary_blocking(
            self.retry.clone_box(),
            self.backoff.clone_box(),
            idempotency,
            "Table::apply",
            &self.call_context(),
            |ctx| self.stub.mutate_row(&ctx, request.clone()),
        )
    }

    pub fn bulk_apply(&self, mutations: BulkMutation) -> Result<()> {
        BulkMutator::new(
            self.table_name.clone(),
            self.app_profile_id.clone(),
            mutations,
            &*self.idempotency,
            self.retry.clone_box(),
            self.backoff.clone_box(),
        )
        .with_context(self.call_context())
        .run_blocking(&*self.stub)
    }
}
