//! Storage error types for the dictionary record store.
//!
//! Every backend maps its native failures onto [`StorageError`] so that the
//! snapshot builder and the write path can reason about retryability without
//! knowing which database sits underneath.

use std::fmt;

/// Errors that can occur while talking to a record store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store could not be reached or timed out. Transient.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the connection or I/O failure.
        message: String,
    },

    /// A row could not be decoded into a dictionary entry.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description of why the data is invalid.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidData` error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable { .. } => ErrorCategory::Infrastructure,
            Self::InvalidData { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of errors for logging and monitoring.
///
/// Shared by the storage layer and the dictionary service so that a single
/// field value can be attached to every failure log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Entity not found.
    NotFound,
    /// Uniqueness conflict.
    Conflict,
    /// Validation error.
    Validation,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Store unavailable: connection refused");

        let err = StorageError::invalid_data("status 7");
        assert_eq!(err.to_string(), "Invalid data: status 7");
    }

    #[test]
    fn test_retryable() {
        assert!(StorageError::unavailable("timeout").is_retryable());
        assert!(!StorageError::invalid_data("bad row").is_retryable());
        assert!(!StorageError::internal("bug").is_retryable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::unavailable("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            StorageError::invalid_data("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
    }
}
