pub mod context;
pub mod error;
pub mod status;

pub use context::{CallContext, REQUEST_PARAMS_HEADER};
pub use error::{Error, Result};
pub use status::{DEFAULT_RETRYABLE_CODES, Status, StatusCode};
