use super::Status;
use crate::mutation::FailedMutation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("RPC error: {0}")]
    Rpc(Status),

    #[error("Retry policy exhausted in {location} after {attempts} attempts, last error: {last}")]
    RetryExhausted {
        location: String,
        attempts: u32,
        last: Status,
    },

    #[error("Polling policy exhausted in {location} while operation '{operation}' was still running")]
    PollingExhausted { location: String, operation: String },

    #[error("Operation '{name}' finished with error: {status}")]
    OperationFailed { name: String, status: Status },

    #[error("Non-idempotent call in {location} failed and was not retried: {status}")]
    NonIdempotent { location: String, status: Status },

    #[error("{} of {total} mutations failed: {cause}", failures.len())]
    PartialFailure {
        cause: Box<Error>,
        total: usize,
        failures: Vec<FailedMutation>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The RPC status most directly responsible for this error, if any.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::Rpc(status)
            | Error::OperationFailed { status, .. }
            | Error::NonIdempotent { status, .. } => Some(status),
            Error::RetryExhausted { last, .. } => Some(last),
            Error::PartialFailure { cause, .. } => cause.status(),
            _ => None,
        }
    }

    /// The failed subset of a bulk apply; empty for every other error.
    pub fn failures(&self) -> &[FailedMutation] {
        match self {
            Error::PartialFailure { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn is_exhausted(&self) -> bool {
        match self {
            Error::RetryExhausted { .. } | Error::PollingExhausted { .. } => true,
            Error::PartialFailure { cause, .. } => cause.is_exhausted(),
            _ => false,
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Rpc(status)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
