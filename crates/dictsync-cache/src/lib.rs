//! # dictsync-cache
//!
//! Read-mostly in-memory view of dictionary data, kept in step with the
//! record store across a fleet of processes.
//!
//! - [`SnapshotBuilder`] loads the store into an immutable [`DictSnapshot`]
//!   when a cheap staleness probe says it changed
//! - [`DictCache`] holds the active snapshot behind an atomic pointer and
//!   serves lookups without locking
//! - [`DictRefreshService`] drives the builder on startup, on a fixed-delay
//!   timer and on [`ChangeNotifier`] signals
//! - [`DictDataService`] validates and applies writes, then signals every
//!   process to refresh

mod builder;
mod cache;
mod error;
mod notifier;
mod refresh;
mod service;
mod snapshot;

#[cfg(test)]
mod testing;

pub use builder::SnapshotBuilder;
pub use cache::DictCache;
pub use error::{DictError, DictResult};
pub use notifier::{
    ChangeNotifier, DEFAULT_CHANNEL_CAPACITY, DictDataChanged, DynChangeNotifier,
    LocalChangeNotifier, NotifyError,
};
pub use refresh::{
    DictRefreshService, RefreshConfig, RefreshOutcome, RefreshStats, RefreshTrigger,
};
pub use service::{DictDataService, LabelScope};
pub use snapshot::DictSnapshot;
