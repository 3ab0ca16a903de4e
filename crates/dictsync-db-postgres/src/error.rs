//! Error types for the PostgreSQL record store.

use dictsync_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// Errors specific to the PostgreSQL record store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Error reported by sqlx: connection, query or decoding.
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if the database could not be reached.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Database(
                SqlxError::Io(_)
                    | SqlxError::Tls(_)
                    | SqlxError::Protocol(_)
                    | SqlxError::PoolTimedOut
                    | SqlxError::PoolClosed
                    | SqlxError::WorkerCrashed
            )
        )
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        if err.is_connection() {
            return StorageError::unavailable(err.to_string());
        }
        match err {
            PostgresError::Database(
                e @ (SqlxError::ColumnDecode { .. } | SqlxError::Decode(_)),
            ) => StorageError::invalid_data(e.to_string()),
            PostgresError::Database(e) => StorageError::internal(e.to_string()),
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Maps a sqlx error straight onto the storage error taxonomy.
pub(crate) fn storage_error(err: SqlxError) -> StorageError {
    PostgresError::from(err).into()
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;
