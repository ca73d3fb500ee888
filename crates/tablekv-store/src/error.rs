//! Error types for the tablekv store.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not establish namespace {namespace}: {message}")]
    NamespaceNotFound { namespace: String, message: String },

    #[error("item already exists in namespace {namespace} for key {key}")]
    ItemConflict { namespace: String, key: String },

    #[error("value not found in namespace {namespace} for key {key}")]
    IdNotFound { namespace: String, key: String },

    #[error("error on {op}: {message}")]
    Internal { op: &'static str, message: String },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("invalid namespace name {0:?}: must match [A-Za-z_][A-Za-z0-9_]{{0,63}}")]
    InvalidNamespace(String),

    #[error("invalid key {0:?}: must be 1 to 14 characters")]
    InvalidKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("failed to connect to backend: {0}")]
    Connection(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Backend failure for the named operation.
    pub(crate) fn internal(op: &'static str, err: impl fmt::Display) -> Self {
        StoreError::Internal {
            op,
            message: err.to_string(),
        }
    }

    /// The stable error kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NamespaceNotFound { .. } => ErrorKind::NamespaceNotFound,
            StoreError::ItemConflict { .. } => ErrorKind::ItemConflict,
            StoreError::IdNotFound { .. } => ErrorKind::IdNotFound,
            StoreError::Internal { .. } => ErrorKind::Internal,
            StoreError::Timeout { .. } => ErrorKind::Timeout,
            StoreError::InvalidNamespace(_) => ErrorKind::InvalidNamespace,
            StoreError::InvalidKey(_) => ErrorKind::InvalidKey,
            StoreError::InvalidValue(_) => ErrorKind::InvalidValue,
            StoreError::Connection(_) => ErrorKind::Connection,
            StoreError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Error taxonomy exposed to callers, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NamespaceNotFound,
    ItemConflict,
    IdNotFound,
    Internal,
    Timeout,
    InvalidNamespace,
    InvalidKey,
    InvalidValue,
    Connection,
    Config,
}

impl ErrorKind {
    /// Wire-stable code, e.g. `ITEM_CONFLICT`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NamespaceNotFound => "NAMESPACE_NOT_FOUND",
            ErrorKind::ItemConflict => "ITEM_CONFLICT",
            ErrorKind::IdNotFound => "ID_NOT_FOUND",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::InvalidNamespace => "INVALID_NAMESPACE",
            ErrorKind::InvalidKey => "INVALID_KEY",
            ErrorKind::InvalidValue => "INVALID_VALUE",
            ErrorKind::Connection => "CONNECTION",
            ErrorKind::Config => "CONFIG",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
