//! Error types for the broker.

use std::io;
use thiserror::Error;

/// Why a cancellation token fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CancelError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Main error type for broker and subscriber operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The broker has irreversibly entered its terminal state.
    #[error("broker is terminated")]
    Terminated,

    /// `start` was called on a broker whose loop is already running or has run.
    #[error("broker loop already started")]
    AlreadyStarted,

    /// The caller's own cancellation token fired first.
    #[error(transparent)]
    Cancelled(#[from] CancelError),
}

impl BrokerError {
    /// True if this error means the broker is gone for good.
    pub fn is_terminated(&self) -> bool {
        matches!(self, BrokerError::Terminated)
    }
}

impl From<BrokerError> for io::Error {
    fn from(e: BrokerError) -> Self {
        let kind = match e {
            BrokerError::Terminated => io::ErrorKind::BrokenPipe,
            BrokerError::AlreadyStarted => io::ErrorKind::Other,
            BrokerError::Cancelled(CancelError::DeadlineExceeded) => io::ErrorKind::TimedOut,
            BrokerError::Cancelled(CancelError::Cancelled) => io::ErrorKind::Interrupted,
        };
        io::Error::new(kind, e)
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
