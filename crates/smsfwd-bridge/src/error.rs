//! Bridge error types.
//!
//! [`ErrorCode`] is what travels back to the caller inside a
//! [`crate::MethodResponse::Error`]. [`BridgeError`] covers failures of the
//! bridge machinery itself, such as a request line that is not a method
//! call at all.

use serde::{Deserialize, Serialize};

/// Error codes reported to the caller of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request payload was missing or malformed. Nothing was changed.
    InvalidArguments,
    /// `saveTask` failed after its arguments were accepted.
    SaveError,
    /// `deleteTask` failed after its arguments were accepted.
    DeleteError,
    /// `getLogs` failed.
    LogsError,
    /// No live handler is attached to the channel.
    Unavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::SaveError => "SAVE_ERROR",
            Self::DeleteError => "DELETE_ERROR",
            Self::LogsError => "LOGS_ERROR",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the bridge itself, as opposed to a method's own errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A wire frame could not be decoded into a method call.
    #[error("malformed method call: {0}")]
    MalformedCall(#[from] serde_json::Error),

    /// The store behind the handler failed outside any single method.
    #[error("store error: {0}")]
    Store(#[from] smsfwd_store::StoreError),
}

/// Convenience alias used throughout the bridge crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
