//! Record store traits.
//!
//! These are the boundaries between the dictionary engine and durable storage.
//! Implementations must be thread-safe (`Send + Sync`); every method may block
//! on I/O and is therefore `async`.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::types::{
    DictData, DictDataFilter, DictDataUpdate, DictTypeInfo, NewDictData, PageParam, PageResult,
};

/// Durable store for dictionary entries.
///
/// Deleted entries are kept as tombstones whose `update_time` is bumped on
/// deletion. Only [`DictDataStore::exists_updated_after`] observes tombstones;
/// every other read returns live entries only.
#[async_trait]
pub trait DictDataStore: Send + Sync {
    /// Returns whether any entry, live or deleted, was mutated strictly after `ts`.
    ///
    /// This is the staleness probe run on every refresh and must stay cheap.
    async fn exists_updated_after(&self, ts: OffsetDateTime) -> Result<bool, StorageError>;

    /// Returns the greatest `update_time` over all entries, live or deleted.
    ///
    /// A snapshot built from [`DictDataStore::fetch_all`] uses this as its
    /// watermark, so deleting the newest entry still advances it. `None` when
    /// the store has never held an entry.
    async fn max_update_time(&self) -> Result<Option<OffsetDateTime>, StorageError>;

    /// Returns every live entry.
    async fn fetch_all(&self) -> Result<Vec<DictData>, StorageError>;

    /// Reads an entry by id.
    async fn fetch_by_id(&self, id: i64) -> Result<Option<DictData>, StorageError>;

    /// Finds an entry by label across all dictionary types.
    async fn fetch_by_label(&self, label: &str) -> Result<Option<DictData>, StorageError>;

    /// Finds an entry by label within one dictionary type.
    async fn fetch_by_type_and_label(
        &self,
        dict_type: &str,
        label: &str,
    ) -> Result<Option<DictData>, StorageError>;

    /// Inserts a new entry and returns it with its assigned id and timestamps.
    async fn insert(&self, entry: &NewDictData) -> Result<DictData, StorageError>;

    /// Rewrites a live entry. Returns `false` if no live entry has that id.
    async fn update_by_id(&self, update: &DictDataUpdate) -> Result<bool, StorageError>;

    /// Deletes a live entry. Returns `false` if no live entry has that id.
    async fn delete_by_id(&self, id: i64) -> Result<bool, StorageError>;

    /// Counts live entries of a dictionary type.
    async fn count_by_type(&self, dict_type: &str) -> Result<u64, StorageError>;

    /// Returns one page of live entries matching `filter`, ordered by `(dict_type, sort)`.
    async fn fetch_page(
        &self,
        filter: &DictDataFilter,
        page: PageParam,
    ) -> Result<PageResult<DictData>, StorageError>;

    /// Returns every live entry matching `filter`.
    async fn fetch_filtered(&self, filter: &DictDataFilter) -> Result<Vec<DictData>, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Read access to dictionary types, owned by a separate collaborator.
#[async_trait]
pub trait DictTypeStore: Send + Sync {
    /// Looks up a dictionary type by its key.
    async fn get_type(&self, dict_type: &str) -> Result<Option<DictTypeInfo>, StorageError>;
}
