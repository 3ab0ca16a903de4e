//! Error types for dictionary data operations.

use dictsync_storage::{ErrorCategory, StorageError};

/// Errors returned by the write path and by refresh attempts.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    /// No live entry has the given id.
    #[error("Dictionary data not found: {id}")]
    DataNotFound { id: i64 },

    /// The referenced dictionary type does not exist.
    #[error("Dictionary type not found: {dict_type}")]
    TypeNotFound { dict_type: String },

    /// The referenced dictionary type exists but is disabled.
    #[error("Dictionary type '{dict_type}' is disabled")]
    TypeDisabled { dict_type: String },

    /// Another entry already uses this label.
    #[error("Dictionary data with label '{label}' already exists (type '{dict_type}')")]
    LabelDuplicate { dict_type: String, label: String },

    /// The record store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DictError {
    #[must_use]
    pub fn data_not_found(id: i64) -> Self {
        Self::DataNotFound { id }
    }

    #[must_use]
    pub fn type_not_found(dict_type: impl Into<String>) -> Self {
        Self::TypeNotFound {
            dict_type: dict_type.into(),
        }
    }

    #[must_use]
    pub fn type_disabled(dict_type: impl Into<String>) -> Self {
        Self::TypeDisabled {
            dict_type: dict_type.into(),
        }
    }

    #[must_use]
    pub fn label_duplicate(dict_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self::LabelDuplicate {
            dict_type: dict_type.into(),
            label: label.into(),
        }
    }

    /// Returns `true` for failures caused by the request itself.
    ///
    /// These are shown to the caller and never retried.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DataNotFound { .. } | Self::TypeNotFound { .. } => ErrorCategory::NotFound,
            Self::LabelDuplicate { .. } => ErrorCategory::Conflict,
            Self::TypeDisabled { .. } => ErrorCategory::Validation,
            Self::Storage(e) => e.category(),
        }
    }
}

/// Result type for dictionary operations.
pub type DictResult<T> = Result<T, DictError>;
