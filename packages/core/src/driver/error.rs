//! Driver error types
//!
//! Errors a provisioning backend can report back to the workflow.

use thiserror::Error;

/// Errors returned by a [`Driver`](super::Driver)
#[derive(Error, Debug)]
pub enum DriverError {
    /// A flag was missing or carried an unusable value
    #[error("Invalid value for '{key}': {reason}")]
    InvalidFlag { key: String, reason: String },

    /// The backend reported a failure (hypervisor, cloud API, remote plugin)
    #[error("{0}")]
    Backend(String),

    /// Local I/O failed while talking to the backend
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Shorthand for a backend failure with the given message
    pub fn backend(msg: impl Into<String>) -> Self {
        DriverError::Backend(msg.into())
    }
}
