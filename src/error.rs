use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error reported by a [`PartiqlClient`](crate::backend::PartiqlClient) implementation.
///
/// The wrapped error is reference counted so one failed batch can be handed to every
/// statement that was staged inside the transaction.
#[derive(Clone)]
pub struct BackendError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl BackendError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// Build a backend error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(MessageError(message.into())))
    }

    /// Borrow the error produced by the backend.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MessageError {}

#[derive(Debug, Clone, Error)]
pub enum PartiqlDbError {
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Parameter binding error at position {position}: {reason}")]
    BindingError { position: usize, reason: String },

    #[error("Statement expects {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("Transaction already active on this connection")]
    TransactionAlreadyActive,

    #[error("Operation not supported within a transaction")]
    NotSupportedInTransaction,

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Statement is closed")]
    StatementClosed,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Transaction worker error: {0}")]
    WorkerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PartiqlDbError {
    pub(crate) fn binding(position: usize, reason: impl Into<String>) -> Self {
        PartiqlDbError::BindingError {
            position,
            reason: reason.into(),
        }
    }
}
