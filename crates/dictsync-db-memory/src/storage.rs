use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dictsync_storage::{
    DictData, DictDataFilter, DictDataStore, DictDataUpdate, NewDictData, PageParam, PageResult,
    StorageError, sort_by_type_and_sort,
};
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// A stored row: the entry plus its tombstone flag.
#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub(crate) data: DictData,
    pub(crate) deleted: bool,
}

/// Issues strictly increasing timestamps.
///
/// Two mutations landing in the same clock tick still get distinct
/// `update_time` values, so a watermark taken between them never hides the
/// second one.
#[derive(Debug)]
pub(crate) struct MonotonicClock {
    last_nanos: AtomicI64,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self {
            last_nanos: AtomicI64::new(i64::MIN),
        }
    }

    pub(crate) fn now(&self) -> Result<OffsetDateTime, StorageError> {
        let wall = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos())
            .map_err(|_| StorageError::internal("system clock out of range"))?;
        let mut prev = self.last_nanos.load(Ordering::Relaxed);
        let next = loop {
            let candidate = wall.max(prev.saturating_add(1));
            match self.last_nanos.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => prev = actual,
            }
        };
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(next))
            .map_err(|e| StorageError::internal(format!("invalid timestamp: {e}")))
    }
}

/// In-memory dictionary data store using papaya lock-free HashMap.
///
/// Reads never take a lock. Mutations are serialized by a single writer lock
/// so that the clock order and the visible order of changes agree.
#[derive(Debug, Clone)]
pub struct InMemoryDictStore {
    rows: Arc<PapayaHashMap<i64, StoredRow>>,
    next_id: Arc<AtomicI64>,
    clock: Arc<MonotonicClock>,
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryDictStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(PapayaHashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
            clock: Arc::new(MonotonicClock::new()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.rows.pin().values().filter(|row| !row.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_rows(&self) -> Vec<DictData> {
        self.rows
            .pin()
            .values()
            .filter(|row| !row.deleted)
            .map(|row| row.data.clone())
            .collect()
    }

    fn find_live(&self, predicate: impl Fn(&DictData) -> bool) -> Option<DictData> {
        let guard = self.rows.pin();
        let mut found: Option<&StoredRow> = None;
        for row in guard.values() {
            if row.deleted || !predicate(&row.data) {
                continue;
            }
            // Lowest id wins so repeated lookups are deterministic.
            if found.is_none_or(|f| row.data.id < f.data.id) {
                found = Some(row);
            }
        }
        found.map(|row| row.data.clone())
    }
}

impl Default for InMemoryDictStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DictDataStore for InMemoryDictStore {
    async fn exists_updated_after(&self, ts: OffsetDateTime) -> Result<bool, StorageError> {
        Ok(self
            .rows
            .pin()
            .values()
            .any(|row| row.data.update_time > ts))
    }

    async fn max_update_time(&self) -> Result<Option<OffsetDateTime>, StorageError> {
        Ok(self
            .rows
            .pin()
            .values()
            .map(|row| row.data.update_time)
            .max())
    }

    async fn fetch_all(&self) -> Result<Vec<DictData>, StorageError> {
        Ok(self.live_rows())
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<DictData>, StorageError> {
        Ok(self
            .rows
            .pin()
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.data.clone()))
    }

    async fn fetch_by_label(&self, label: &str) -> Result<Option<DictData>, StorageError> {
        Ok(self.find_live(|data| data.label == label))
    }

    async fn fetch_by_type_and_label(
        &self,
        dict_type: &str,
        label: &str,
    ) -> Result<Option<DictData>, StorageError> {
        Ok(self.find_live(|data| data.dict_type == dict_type && data.label == label))
    }

    async fn insert(&self, entry: &NewDictData) -> Result<DictData, StorageError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now()?;
        let data = DictData {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            dict_type: entry.dict_type.clone(),
            label: entry.label.clone(),
            value: entry.value.clone(),
            sort: entry.sort,
            status: entry.status,
            remark: entry.remark.clone(),
            create_time: now,
            update_time: now,
        };
        self.rows.pin().insert(
            data.id,
            StoredRow {
                data: data.clone(),
                deleted: false,
            },
        );
        Ok(data)
    }

    async fn update_by_id(&self, update: &DictDataUpdate) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let guard = self.rows.pin();
        let Some(current) = guard.get(&update.id).filter(|row| !row.deleted) else {
            return Ok(false);
        };
        let data = DictData {
            id: update.id,
            dict_type: update.dict_type.clone(),
            label: update.label.clone(),
            value: update.value.clone(),
            sort: update.sort,
            status: update.status,
            remark: update.remark.clone(),
            create_time: current.data.create_time,
            update_time: self.clock.now()?,
        };
        guard.insert(
            update.id,
            StoredRow {
                data,
                deleted: false,
            },
        );
        Ok(true)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let guard = self.rows.pin();
        let Some(current) = guard.get(&id).filter(|row| !row.deleted) else {
            return Ok(false);
        };
        let mut tombstone = current.clone();
        tombstone.deleted = true;
        tombstone.data.update_time = self.clock.now()?;
        guard.insert(id, tombstone);
        Ok(true)
    }

    async fn count_by_type(&self, dict_type: &str) -> Result<u64, StorageError> {
        let count = self
            .rows
            .pin()
            .values()
            .filter(|row| !row.deleted && row.data.dict_type == dict_type)
            .count();
        Ok(count as u64)
    }

    async fn fetch_page(
        &self,
        filter: &DictDataFilter,
        page: PageParam,
    ) -> Result<PageResult<DictData>, StorageError> {
        let mut matching = self.fetch_filtered(filter).await?;
        sort_by_type_and_sort(&mut matching);
        let total = matching.len() as u64;
        let list = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok(PageResult::new(list, total))
    }

    async fn fetch_filtered(&self, filter: &DictDataFilter) -> Result<Vec<DictData>, StorageError> {
        Ok(self
            .live_rows()
            .into_iter()
            .filter(|data| filter.matches(data))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dictsync_storage::CommonStatus;

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = MonotonicClock::new();
        let mut prev = clock.now().unwrap();
        for _ in 0..1000 {
            let next = clock.now().unwrap();
            assert!(next > prev);
            prev = next;
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_timestamps() {
        let store = InMemoryDictStore::new();
        let a = store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        let b = store
            .insert(&NewDictData::new("gender", "Female", "2"))
            .await
            .unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.create_time, a.update_time);
        assert!(b.update_time > a.update_time);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_update_bumps_update_time_and_keeps_create_time() {
        let store = InMemoryDictStore::new();
        let created = store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();

        let update = DictDataUpdate::from_new(
            created.id,
            NewDictData::new("gender", "Man", "1").with_status(CommonStatus::Disabled),
        );
        assert!(store.update_by_id(&update).await.unwrap());

        let read = store.fetch_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(read.label, "Man");
        assert_eq!(read.status, CommonStatus::Disabled);
        assert_eq!(read.create_time, created.create_time);
        assert!(read.update_time > created.update_time);

        let missing = DictDataUpdate::from_new(99, NewDictData::new("gender", "X", "9"));
        assert!(!store.update_by_id(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_leaves_tombstone_visible_to_staleness_probe() {
        let store = InMemoryDictStore::new();
        let created = store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        let watermark = created.update_time;
        assert!(!store.exists_updated_after(watermark).await.unwrap());

        assert!(store.delete_by_id(created.id).await.unwrap());
        assert!(!store.delete_by_id(created.id).await.unwrap());

        assert!(store.exists_updated_after(watermark).await.unwrap());
        assert!(store.fetch_all().await.unwrap().is_empty());
        assert!(store.fetch_by_id(created.id).await.unwrap().is_none());
        assert!(store.fetch_by_label("Male").await.unwrap().is_none());
        assert_eq!(store.count_by_type("gender").await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_max_update_time_includes_tombstones() {
        let store = InMemoryDictStore::new();
        assert!(store.max_update_time().await.unwrap().is_none());

        let created = store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        assert_eq!(
            store.max_update_time().await.unwrap(),
            Some(created.update_time)
        );

        store.delete_by_id(created.id).await.unwrap();
        let after_delete = store.max_update_time().await.unwrap().unwrap();
        assert!(after_delete > created.update_time);
        assert!(!store.exists_updated_after(after_delete).await.unwrap());
    }

    #[tokio::test]
    async fn test_label_lookups() {
        let store = InMemoryDictStore::new();
        store
            .insert(&NewDictData::new("gender", "Unknown", "0"))
            .await
            .unwrap();
        store
            .insert(&NewDictData::new("user_status", "Active", "0"))
            .await
            .unwrap();

        let global = store.fetch_by_label("Unknown").await.unwrap().unwrap();
        assert_eq!(global.dict_type, "gender");

        assert!(
            store
                .fetch_by_type_and_label("user_status", "Unknown")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .fetch_by_type_and_label("user_status", "Active")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_fetch_page_filters_sorts_and_counts() {
        let store = InMemoryDictStore::new();
        store
            .insert(&NewDictData::new("user_status", "Locked", "1").with_sort(2))
            .await
            .unwrap();
        store
            .insert(&NewDictData::new("gender", "Female", "2").with_sort(2))
            .await
            .unwrap();
        store
            .insert(&NewDictData::new("gender", "Male", "1").with_sort(1))
            .await
            .unwrap();
        store
            .insert(&NewDictData::new("user_status", "Active", "0").with_sort(1))
            .await
            .unwrap();

        let all = store
            .fetch_page(&DictDataFilter::new(), PageParam::new(1, 3))
            .await
            .unwrap();
        assert_eq!(all.total, 4);
        let labels: Vec<&str> = all.list.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Male", "Female", "Active"]);

        let second = store
            .fetch_page(&DictDataFilter::new(), PageParam::new(2, 3))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.list[0].label, "Locked");

        let gender = store
            .fetch_page(
                &DictDataFilter::new().with_dict_type("gender").with_label("ale"),
                PageParam::default(),
            )
            .await
            .unwrap();
        assert_eq!(gender.total, 2);
    }
}
