//! Change notification bus.
//!
//! A single payload-less message tells every process that dictionary data
//! changed. Receivers always re-check the store instead of applying a delta.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

/// Default buffer size for the in-process broadcast channel.
///
/// Since the message carries nothing, a lagged receiver loses no information:
/// lag is reported as one change.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// "Dictionary data changed, refresh now."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DictDataChanged;

/// Errors that can occur while publishing a change notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The transport refused or failed to deliver the message.
    #[error("Change notification failed: {message}")]
    Transport { message: String },
}

impl NotifyError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Publish/subscribe bus reaching every process instance, the sender included.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Broadcasts [`DictDataChanged`].
    ///
    /// Having no subscribers is not an error.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the transport fails.
    async fn publish(&self) -> Result<(), NotifyError>;

    /// Subscribes to changes published after this call.
    fn subscribe(&self) -> broadcast::Receiver<DictDataChanged>;
}

/// Shared handle to a change notifier.
pub type DynChangeNotifier = Arc<dyn ChangeNotifier>;

/// In-process bus over a tokio broadcast channel.
///
/// Cloning shares the channel, so clones handed to several caches behave
/// like separate processes on one bus.
#[derive(Debug, Clone)]
pub struct LocalChangeNotifier {
    sender: broadcast::Sender<DictDataChanged>,
}

impl LocalChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends a change and returns how many subscribers received it.
    pub fn send(&self) -> usize {
        self.sender.send(DictDataChanged).unwrap_or_default()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeNotifier for LocalChangeNotifier {
    async fn publish(&self) -> Result<(), NotifyError> {
        let receivers = self.send();
        tracing::debug!(receivers, "Published dictionary data change");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DictDataChanged> {
        self.sender.subscribe()
    }
}
