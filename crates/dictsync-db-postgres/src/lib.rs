//! PostgreSQL record store backend for DictSync.
//!
//! Provides [`PostgresDictStore`] and [`PostgresDictTypeStore`] over the
//! `system_dict_data` and `system_dict_type` tables, the embedded schema
//! migrations, and [`PgChangeNotifier`] for fleet-wide change signals over
//! LISTEN/NOTIFY.
//!
//! # Example
//!
//! ```ignore
//! use dictsync_db_postgres::{PostgresConfig, PostgresDictStore, connect};
//!
//! let pool = connect(&PostgresConfig::new("postgres://localhost/dictsync")).await?;
//! let store = PostgresDictStore::new(pool);
//! ```

mod config;
mod error;
mod listener;
pub mod migrations;
mod pool;
mod storage;

pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use listener::{DEFAULT_NOTIFY_CHANNEL, ListenerError, PgChangeNotifier};
pub use pool::{PgPoolOptions, create_pool};
pub use storage::{PostgresDictStore, PostgresDictTypeStore};

/// Re-export PgPool for convenience.
pub type PgPool = sqlx_postgres::PgPool;

/// Creates a pool and applies migrations if the configuration asks for it.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool> {
    if config.url.trim().is_empty() {
        return Err(PostgresError::config("database url is empty"));
    }
    let pool = create_pool(config).await?;
    if config.run_migrations {
        migrations::run(&pool).await?;
    }
    Ok(pool)
}
