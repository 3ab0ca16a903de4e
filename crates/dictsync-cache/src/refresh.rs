//! Refresh scheduler for the dictionary snapshot cache.
//!
//! Three triggers converge on [`DictRefreshService::refresh_now`]:
//!
//! - startup, through [`DictRefreshService::init`]
//! - a fixed-delay timer, restarted after every attempt
//! - change notifications from the [`ChangeNotifier`](crate::ChangeNotifier) bus
//!
//! # Example
//!
//! ```ignore
//! use dictsync_cache::{DictCache, DictRefreshService, RefreshConfig, SnapshotBuilder};
//! use std::sync::Arc;
//!
//! let service = Arc::new(DictRefreshService::new(
//!     SnapshotBuilder::new(store),
//!     cache.clone(),
//!     notifier,
//!     RefreshConfig::default(),
//! ));
//! service.init().await;
//! let handle = service.clone().spawn();
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dictsync_storage::StorageError;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;

use crate::builder::SnapshotBuilder;
use crate::cache::DictCache;
use crate::notifier::{DictDataChanged, DynChangeNotifier};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the refresh scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Delay between the end of one attempt and the next timer-driven one.
    ///
    /// Zero disables the timer; only startup and signals refresh then.
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl RefreshConfig {
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Configuration that refreshes on startup and signals only.
    #[must_use]
    pub fn without_periodic_refresh() -> Self {
        Self {
            interval: Duration::ZERO,
        }
    }

    fn period(&self) -> Option<Duration> {
        (!self.interval.is_zero()).then_some(self.interval)
    }
}

// =============================================================================
// Triggers and outcomes
// =============================================================================

/// What caused a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
    Startup,
    Periodic,
    Signal,
    Manual,
}

impl RefreshTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Periodic => "periodic",
            Self::Signal => "signal",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was built and is now active.
    Published,
    /// The store had not changed, or the fetch came back empty.
    Unchanged,
    /// A snapshot was built but a newer one had already been published.
    Rejected,
}

/// Statistics about the refresh scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Total number of refresh attempts.
    pub attempts: u64,
    /// Attempts that published a new snapshot.
    pub published: u64,
    /// Attempts that left the active snapshot in place without error.
    pub unchanged: u64,
    /// Attempts that failed on a store error.
    pub failures: u64,
    /// Change notifications received, lag counted as one.
    pub signals_received: u64,
}

// =============================================================================
// Refresh Service
// =============================================================================

/// Keeps a [`DictCache`] in step with the record store.
pub struct DictRefreshService {
    builder: SnapshotBuilder,
    cache: DictCache,
    notifier: DynChangeNotifier,
    config: RefreshConfig,

    /// Subscribed at construction so no change published after `new` is missed.
    receiver: Mutex<Option<broadcast::Receiver<DictDataChanged>>>,

    shutdown: AtomicBool,
    shutdown_signal: Notify,

    attempts: AtomicU64,
    published: AtomicU64,
    unchanged: AtomicU64,
    failures: AtomicU64,
    signals_received: AtomicU64,
}

impl DictRefreshService {
    #[must_use]
    pub fn new(
        builder: SnapshotBuilder,
        cache: DictCache,
        notifier: DynChangeNotifier,
        config: RefreshConfig,
    ) -> Self {
        let receiver = notifier.subscribe();
        Self {
            builder,
            cache,
            notifier,
            config,
            receiver: Mutex::new(Some(receiver)),
            shutdown: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
            attempts: AtomicU64::new(0),
            published: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            signals_received: AtomicU64::new(0),
        }
    }

    /// Startup refresh.
    ///
    /// A failure is logged and swallowed: the cache starts empty and heals on
    /// the next trigger.
    pub async fn init(&self) {
        if let Err(e) = self.refresh_now(RefreshTrigger::Startup).await {
            tracing::error!(
                error = %e,
                category = %e.category(),
                "Initial dictionary load failed, starting with an empty cache"
            );
        }
    }

    /// Rebuilds the snapshot if the store changed since the active watermark.
    ///
    /// Safe to call concurrently with itself: the cache never accepts a
    /// snapshot older than the active one.
    ///
    /// # Errors
    ///
    /// Returns the store error. The active snapshot stays in place.
    pub async fn refresh_now(
        &self,
        trigger: RefreshTrigger,
    ) -> Result<RefreshOutcome, StorageError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let watermark = self.cache.current_watermark();

        let built = match self.builder.build_if_stale(watermark).await {
            Ok(built) => built,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    trigger = %trigger,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Dictionary refresh failed, keeping current snapshot"
                );
                return Err(e);
            }
        };

        let outcome = match built {
            Some(snapshot) => {
                let entries = snapshot.len();
                if self.cache.publish(snapshot) {
                    self.published.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(trigger = %trigger, entries, "Dictionary cache refreshed");
                    RefreshOutcome::Published
                } else {
                    self.unchanged.fetch_add(1, Ordering::Relaxed);
                    RefreshOutcome::Rejected
                }
            }
            None => {
                self.unchanged.fetch_add(1, Ordering::Relaxed);
                RefreshOutcome::Unchanged
            }
        };
        tracing::debug!(trigger = %trigger, outcome = ?outcome, "Dictionary refresh finished");
        Ok(outcome)
    }

    /// Runs the scheduler until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        let mut receiver = match self.receiver.lock().await.take() {
            Some(receiver) => receiver,
            None => self.notifier.subscribe(),
        };
        let period = self.config.period();
        let mut signals_open = true;

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Dictionary refresh service started"
        );

        loop {
            if self.is_shutting_down() {
                break;
            }

            // Rebuilt on every pass, so the delay counts from the end of the
            // previous attempt whatever triggered it.
            let timer = async {
                match period {
                    Some(period) => tokio::time::sleep(period).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.shutdown_signal.notified() => break,

                result = receiver.recv(), if signals_open => {
                    match result {
                        Ok(DictDataChanged) => {
                            self.signals_received.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!("Dictionary change signal received");
                        }
                        Err(RecvError::Lagged(missed)) => {
                            self.signals_received.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(missed, "Missed dictionary change signals");
                        }
                        Err(RecvError::Closed) => {
                            tracing::warn!("Change notification channel closed, relying on timer");
                            signals_open = false;
                            continue;
                        }
                    }
                    self.refresh_in_loop(RefreshTrigger::Signal).await;
                }

                _ = timer => {
                    self.refresh_in_loop(RefreshTrigger::Periodic).await;
                }
            }
        }

        tracing::info!("Dictionary refresh service shutting down");
    }

    /// Refreshes from inside the loop, where a failure never stops it.
    ///
    /// `refresh_now` has already logged and counted the error. The active
    /// snapshot keeps serving until the next trigger.
    async fn refresh_in_loop(&self, trigger: RefreshTrigger) {
        if let Err(error) = self.refresh_now(trigger).await {
            tracing::debug!(trigger = %trigger, error = %error, "Serving stale dictionary snapshot");
        }
    }

    /// Runs the scheduler on a background task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Stops the scheduler loop without waiting for the next timer tick.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.shutdown_signal.notify_one();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            signals_received: self.signals_received.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &DictCache {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
