// ============================================================================
// Client Configuration
// ============================================================================
//
// Serializable settings for a table client. Policies are described as data
// here and turned into prototypes by the `build()` factories; each call then
// takes its own instance from the prototype.
//
// ============================================================================

use crate::core::{Error, Result};
use crate::policy::{
    AlwaysRetryMutationPolicy, BackoffPolicy, ExponentialBackoffPolicy, GenericPollingPolicy,
    IdempotentMutationPolicy, LimitedErrorCountRetryPolicy, LimitedTimeRetryPolicy,
    PollingPolicy, RetryPolicy, SafeIdempotentMutationPolicy,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryConfig {
    /// Tolerates up to `max_failures` transient failures.
    LimitedErrorCount { max_failures: u32 },
    /// Retries transient failures until `max_duration_ms` has elapsed.
    LimitedTime { max_duration_ms: u64 },
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::LimitedTime {
            max_duration_ms: 10 * 60_000,
        }
    }
}

impl RetryConfig {
    pub fn build(&self) -> Box<dyn RetryPolicy> {
        match self {
            Self::LimitedErrorCount { max_failures } => {
                Box::new(LimitedErrorCountRetryPolicy::new(*max_failures))
            }
            Self::LimitedTime { max_duration_ms } => Box::new(LimitedTimeRetryPolicy::new(
                Duration::from_millis(*max_duration_ms),
            )),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::LimitedTime { max_duration_ms: 0 } => Err(Error::Config(
                "limited_time retry needs max_duration_ms > 0".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub maximum_delay_ms: u64,
    pub growth: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 10,
            maximum_delay_ms: 5 * 60_000,
            growth: 2.0,
            jitter_min: 0.5,
            jitter_max: 1.5,
        }
    }
}

impl BackoffConfig {
    pub fn build(&self) -> Result<ExponentialBackoffPolicy> {
        ExponentialBackoffPolicy::builder()
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_maximum_delay(Duration::from_millis(self.maximum_delay_ms))
            .with_growth(self.growth)
            .with_jitter(self.jitter_min, self.jitter_max)
            .build()
    }
}

/// Settings for long-running operation polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub retry: RetryConfig,
    pub backoff: BackoffConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::LimitedTime {
                max_duration_ms: 30 * 60_000,
            },
            backoff: BackoffConfig {
                initial_delay_ms: 1_000,
                maximum_delay_ms: 60_000,
                ..BackoffConfig::default()
            },
        }
    }
}

impl PollingConfig {
    pub fn build(&self) -> Result<Box<dyn PollingPolicy>> {
        let backoff: Box<dyn BackoffPolicy> = Box::new(self.backoff.build()?);
        Ok(Box::new(GenericPollingPolicy::new(
            self.retry.build(),
            backoff,
        )))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyMode {
    #[default]
    Safe,
    AlwaysRetry,
}

impl IdempotencyMode {
    pub fn build(&self) -> Box<dyn IdempotentMutationPolicy> {
        match self {
            Self::Safe => Box::new(SafeIdempotentMutationPolicy),
            Self::AlwaysRetry => Box::new(AlwaysRetryMutationPolicy),
        }
    }
}

/// Client configuration
///
/// # Examples
///
/// ```
/// use tablemut::config::{ClientOptions, RetryConfig};
///
/// let options = ClientOptions::new("my-project", "my-instance")
///     .retry(RetryConfig::LimitedErrorCount { max_failures: 3 });
/// assert!(options.validate().is_ok());
/// assert_eq!(
///     options.table_name("events"),
///     "projects/my-project/instances/my-instance/tables/events"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    pub project_id: String,
    pub instance_id: String,

    /// Empty selects the instance's default profile.
    #[serde(default)]
    pub app_profile_id: String,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub idempotency: IdempotencyMode,
}

impl ClientOptions {
    pub fn new(project_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            app_profile_id: String::new(),
            retry: RetryConfig::default(),
            backoff: BackoffConfig::default(),
            polling: PollingConfig::default(),
            idempotency: IdempotencyMode::default(),
        }
    }

    pub fn app_profile_id(mut self, app_profile_id: impl Into<String>) -> Self {
        self.app_profile_id = app_profile_id.into();
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    pub fn idempotency(mut self, idempotency: IdempotencyMode) -> Self {
        self.idempotency = idempotency;
        self
    }

    /// Parse and validate options from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            return Err(Error::Config("project_id must not be empty".to_string()));
        }
        if self.instance_id.is_empty() {
            return Err(Error::Config("instance_id must not be empty".to_string()));
        }
        self.retry.validate()?;
        self.backoff.build()?;
        self.polling.retry.validate()?;
        self.polling.backoff.build()?;
        Ok(())
    }

    pub fn instance_name(&self) -> String {
        format!("projects/{}/instances/{}", self.project_id, self.instance_id)
    }

    pub fn table_name(&self, table_id: &str) -> String {
        format!("{}/tables/{}", self.instance_name(), table_id)
    }
}
