//! Connection pool management for the PostgreSQL record store.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgConnectOptions, PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::Result;

/// Type alias for PostgreSQL pool options.
pub type PgPoolOptions = PoolOptions<Postgres>;

/// Creates the pool shared by the record store, type lookup and listener.
///
/// When `reserve_listener_connection` is set the pool grows by one so the
/// long-lived LISTEN session does not count against `pool_size`.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let max_connections = config.max_connections();
    info!(
        pool_size = config.pool_size,
        max_connections,
        listener_reserved = config.reserve_listener_connection,
        connect_timeout_ms = config.connect_timeout_ms,
        "Creating PostgreSQL connection pool"
    );

    let connect_options =
        PgConnectOptions::from_str(&config.url)?.application_name(&config.application_name);

    let mut options = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections((config.pool_size / 4).max(1))
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms));

    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }

    let pool = options.connect_with(connect_options).await?;
    debug!("PostgreSQL connection pool created");
    Ok(pool)
}

/// Masks the password in a database URL for logging.
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
