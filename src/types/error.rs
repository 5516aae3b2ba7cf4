use anyhow::Error;
use thiserror::Error;

/// Application-level error types for s3batch-rs.
///
/// Fatal variants stop the run before (or, for `ReportWrite`, after) the
/// batch. `ObjectNotFound` is an item-level failure that the reconciler
/// records and moves past.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Cancelled
/// - 1: Auth, Connectivity, InputRead, Mapping, ObjectNotFound, ReportWrite
/// - 2: InvalidConfig
#[derive(Error, Debug, PartialEq)]
pub enum S3batchError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credentials were rejected by the storage service.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The bucket could not be reached.
    #[error("Bucket is not reachable: {0}")]
    Connectivity(String),

    #[error("Failed to read input list: {0}")]
    InputRead(String),

    /// A source URL does not contain the bucket delimiter. The whole run stops
    /// so that no key is derived from a malformed URL.
    #[error("Failed to map URL to storage key: {0}")]
    Mapping(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Failed to write report: {0}")]
    ReportWrite(String),

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl S3batchError {
    pub fn exit_code(&self) -> i32 {
        match self {
            S3batchError::Cancelled => 0,
            S3batchError::InvalidConfig(_) => 2,
            _ => 1,
        }
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<S3batchError>() {
        return *err == S3batchError::Cancelled;
    }
    false
}

/// Check if an anyhow::Error wraps an object-not-found error.
pub fn is_not_found_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3batchError>(),
        Some(S3batchError::ObjectNotFound(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3batchError>() {
        return err.exit_code();
    }
    1
}
