//! Store wrapper that records calls and injects failures.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dictsync_db_memory::InMemoryDictStore;
use dictsync_storage::{
    DictData, DictDataFilter, DictDataStore, DictDataUpdate, NewDictData, PageParam, PageResult,
    StorageError,
};
use time::OffsetDateTime;

pub(crate) struct RecordingStore {
    inner: InMemoryDictStore,
    exists_calls: AtomicUsize,
    fetch_all_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    fail_count: AtomicUsize,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryDictStore::new(),
            exists_calls: AtomicUsize::new(0),
            fetch_all_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            fail_count: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` probe or fetch calls fail as unavailable.
    pub(crate) fn fail_next(&self, count: usize) {
        self.fail_count.store(count, Ordering::SeqCst);
    }

    pub(crate) fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_all_calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let failed = self
            .fail_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(StorageError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DictDataStore for RecordingStore {
    async fn exists_updated_after(&self, ts: OffsetDateTime) -> Result<bool, StorageError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        self.inner.exists_updated_after(ts).await
    }

    async fn max_update_time(&self) -> Result<Option<OffsetDateTime>, StorageError> {
        self.inner.max_update_time().await
    }

    async fn fetch_all(&self) -> Result<Vec<DictData>, StorageError> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        self.inner.fetch_all().await
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<DictData>, StorageError> {
        self.inner.fetch_by_id(id).await
    }

    async fn fetch_by_label(&self, label: &str) -> Result<Option<DictData>, StorageError> {
        self.inner.fetch_by_label(label).await
    }

    async fn fetch_by_type_and_label(
        &self,
        dict_type: &str,
        label: &str,
    ) -> Result<Option<DictData>, StorageError> {
        self.inner.fetch_by_type_and_label(dict_type, label).await
    }

    async fn insert(&self, entry: &NewDictData) -> Result<DictData, StorageError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(entry).await
    }

    async fn update_by_id(&self, update: &DictDataUpdate) -> Result<bool, StorageError> {
        self.inner.update_by_id(update).await
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, StorageError> {
        self.inner.delete_by_id(id).await
    }

    async fn count_by_type(&self, dict_type: &str) -> Result<u64, StorageError> {
        self.inner.count_by_type(dict_type).await
    }

    async fn fetch_page(
        &self,
        filter: &DictDataFilter,
        page: PageParam,
    ) -> Result<PageResult<DictData>, StorageError> {
        self.inner.fetch_page(filter, page).await
    }

    async fn fetch_filtered(&self, filter: &DictDataFilter) -> Result<Vec<DictData>, StorageError> {
        self.inner.fetch_filtered(filter).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
