//! In-memory record store backend for DictSync.
//!
//! This crate provides in-memory implementations of the `DictDataStore` and
//! `DictTypeStore` traits from `dictsync-storage`, using papaya lock-free
//! HashMap for concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use dictsync_db_memory::InMemoryDictStore;
//! use dictsync_storage::{DictDataStore, NewDictData};
//!
//! let store = InMemoryDictStore::new();
//! let created = store.insert(&NewDictData::new("gender", "Male", "1")).await?;
//! assert!(store.fetch_by_id(created.id).await?.is_some());
//! ```

pub mod storage;
pub mod type_store;

pub use dictsync_storage::{DictDataStore, DictTypeStore, StorageError};
pub use storage::InMemoryDictStore;
pub use type_store::InMemoryDictTypeStore;
