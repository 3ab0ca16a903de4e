//! PostgreSQL LISTEN/NOTIFY change notifier.
//!
//! Publishing runs `pg_notify` on the configured channel. A background task
//! holds a `LISTEN` connection and forwards every notification into a local
//! broadcast channel that the refresh scheduler subscribes to.
//!
//! # Example
//!
//! ```ignore
//! use dictsync_db_postgres::PgChangeNotifier;
//! use std::sync::Arc;
//!
//! let notifier = Arc::new(PgChangeNotifier::new(pool, "dictsync_dict_data_changed"));
//! let handle = notifier.clone().start();
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dictsync_cache::{ChangeNotifier, DEFAULT_CHANNEL_CAPACITY, DictDataChanged, NotifyError};
use sqlx_core::query::query;
use sqlx_postgres::{PgListener, PgPool};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

/// Default PostgreSQL channel for dictionary change notifications.
pub const DEFAULT_NOTIFY_CHANNEL: &str = "dictsync_dict_data_changed";

/// Reconnection delay on error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Change notifier over PostgreSQL LISTEN/NOTIFY.
///
/// Notifications sent while the listener is disconnected are lost. After
/// every successful (re)connect the listener emits one synthetic change, so
/// subscribers re-check the store once and catch up.
pub struct PgChangeNotifier {
    pool: PgPool,
    channel: String,
    sender: broadcast::Sender<DictDataChanged>,
}

impl PgChangeNotifier {
    #[must_use]
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            pool,
            channel: channel.into(),
            sender,
        }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Starts the LISTEN task in the background.
    ///
    /// On connection errors it reconnects after a fixed delay. The task runs
    /// until aborted.
    #[instrument(skip(self), fields(channel = %self.channel), name = "dict_listener")]
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!("Starting dictionary change listener");

        tokio::spawn(async move {
            loop {
                if let Err(e) = self.listen_loop().await {
                    error!(
                        error = %e,
                        delay_secs = RECONNECT_DELAY.as_secs(),
                        "Dictionary change listener error, reconnecting"
                    );
                    sleep(RECONNECT_DELAY).await;
                }
            }
        })
    }

    async fn listen_loop(&self) -> Result<(), ListenerError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;
        info!(channel = %self.channel, "Listening for dictionary changes");

        // Whatever was published while we were not listening.
        self.sender.send(DictDataChanged).unwrap_or_default();

        loop {
            let notification = listener.recv().await?;
            debug!(
                channel = notification.channel(),
                process_id = notification.process_id(),
                "Received dictionary NOTIFY"
            );
            self.sender.send(DictDataChanged).unwrap_or_default();
        }
    }
}

#[async_trait]
impl ChangeNotifier for PgChangeNotifier {
    async fn publish(&self) -> Result<(), NotifyError> {
        query("SELECT pg_notify($1, '')")
            .bind(&self.channel)
            .execute(&self.pool)
            .await
            .map_err(|e| NotifyError::transport(e.to_string()))?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DictDataChanged> {
        self.sender.subscribe()
    }
}

/// Errors that can occur in the change listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),
}
