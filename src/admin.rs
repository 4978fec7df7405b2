// ============================================================================
// Table Administration
// ============================================================================
//
// Replication consistency checks. A consistency token marks the writes
// issued so far; waiting for it polls `CheckConsistency` until the server
// reports every marked write replicated.
//
// ============================================================================

use crate::config::ClientOptions;
use crate::core::{CallContext, REQUEST_PARAMS_HEADER, Result, Status};
use crate::executor::CompletionQueue;
use crate::longrunning::{AsyncPollOp, PollAttempt, PollFuture, PollableOperation};
use crate::policy::{BackoffPolicy, PollingPolicy, RetryPolicy};
use crate::retry_loop::{Idempotency, retry_unary};
use crate::rpc::AdminStub;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TableAdmin {
    stub: Arc<dyn AdminStub>,
    cq: CompletionQueue,
    instance_name: String,
    retry: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn BackoffPolicy>,
    polling: Arc<dyn PollingPolicy>,
}

impl TableAdmin {
    pub fn new(
        stub: Arc<dyn AdminStub>,
        cq: CompletionQueue,
        options: &ClientOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            stub,
            cq,
            instance_name: options.instance_name(),
            retry: Arc::from(options.retry.build()),
            backoff: Arc::new(options.backoff.build()?),
            polling: Arc::from(options.polling.build()?),
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

    pub fn with_polling_policy(mut self, policy: impl PollingPolicy + 'static) -> Self {
        self.polling = Arc::new(policy);
        self
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn table_name(&self, table_id: &str) -> String {
        format!("{}/tables/{}", self.instance_name, table_id)
    }

    fn call_context(table_name: &str) -> CallContext {
        let mut ctx = CallContext::new();
        ctx.add_metadata(REQUEST_PARAMS_HEADER, format!("name={}", table_name));
        ctx
    }

    /// Marks the writes issued so far; the token is later passed to
    /// [`wait_for_consistency`](Self::wait_for_consistency).
    pub async fn generate_consistency_token(&self, table_id: &str) -> Result<String> {
        let table_name = self.table_name(table_id);
        let stub = &self.stub;
        retry_unary(
            &self.cq,
            self.retry.clone_box(),
            self.backoff.clone_box(),
            Idempotency::Idempotent,
            "TableAdmin::generate_consistency_token",
            &Self::call_context(&table_name),
            |ctx| {
                let table_name = table_name.clone();
                async move { stub.generate_consistency_token(&ctx, &table_name).await }
            },
        )
        .await
    }

    /// One consistency check, retried on transient failures.
    pub async fn check_consistency(&self, table_id: &str, token: &str) -> Result<bool> {
        let table_name = self.table_name(table_id);
        let stub = &self.stub;
        retry_unary(
            &self.cq,
            self.retry.clone_box(),
            self.backoff.clone_box(),
            Idempotency::Idempotent,
            "TableAdmin::check_consistency",
            &Self::call_context(&table_name),
            |ctx| {
                let table_name = table_name.clone();
                async move { stub.check_consistency(&ctx, &table_name, token).await }
            },
        )
        .await
    }

    /// Polls until the writes marked by `token` have replicated.
    pub fn wait_for_consistency(&self, table_id: &str, token: impl Into<String>) -> PollFuture<()> {
        let table_name = self.table_name(table_id);
        let check = ConsistencyCheck {
            stub: Arc::clone(&self.stub),
            table_name: table_name.clone(),
            token: token.into(),
        };
        AsyncPollOp::new(
            "TableAdmin::wait_for_consistency",
            self.polling.clone_box(),
            check,
        )
        .with_context(Self::call_context(&table_name))
        .spawn(&self.cq)
    }
}

#[derive(Debug)]
struct ConsistencyCheck {
    stub: Arc<dyn AdminStub>,
    table_name: String,
    token: String,
}

#[async_trait]
impl PollableOperation for ConsistencyCheck {
    type Output = ();

    fn name(&self) -> &str {
        &self.table_name
    }

    async fn start(&mut self, ctx: &CallContext) -> std::result::Result<PollAttempt, Status> {
        let consistent = self
            .stub
            .check_consistency(ctx, &self.table_name, &self.token)
            .await?;
        Ok(if consistent {
            PollAttempt::Done
        } else {
            PollAttempt::InProgress
        })
    }

    fn accumulated_result(&mut self) -> Result<()> {
        Ok(())
    }
}
