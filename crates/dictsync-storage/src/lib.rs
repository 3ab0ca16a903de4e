//! # dictsync-storage
//!
//! Data model and storage abstraction for dictionary data.
//!
//! This crate defines the traits that all record store backends implement.
//! It does not contain any implementations - those are provided by
//! `dictsync-db-memory` and `dictsync-db-postgres`.
//!
//! ## Example
//!
//! ```ignore
//! use dictsync_storage::{DictDataFilter, DictDataStore, StorageError};
//!
//! async fn labels_of(store: &dyn DictDataStore, dict_type: &str) -> Result<Vec<String>, StorageError> {
//!     let filter = DictDataFilter::new().with_dict_type(dict_type);
//!     let rows = store.fetch_filtered(&filter).await?;
//!     Ok(rows.into_iter().map(|row| row.label).collect())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{DictDataStore, DictTypeStore};
pub use types::{
    CommonStatus, DictData, DictDataFilter, DictDataUpdate, DictTypeInfo, NewDictData, PageParam,
    PageResult, sort_by_type_and_sort,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle to a dictionary data store.
pub type DynDictDataStore = std::sync::Arc<dyn DictDataStore>;

/// Shared handle to a dictionary type store.
pub type DynDictTypeStore = std::sync::Arc<dyn DictTypeStore>;
