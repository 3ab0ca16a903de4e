//! Builds new snapshots from the record store when it has changed.

use dictsync_storage::{DynDictDataStore, StorageError};
use time::OffsetDateTime;

use crate::snapshot::DictSnapshot;

/// Pulls data from the record store and produces snapshots.
///
/// The builder holds no state of its own. The watermark always comes from
/// the caller, normally the cache's active snapshot.
#[derive(Clone)]
pub struct SnapshotBuilder {
    store: DynDictDataStore,
}

impl SnapshotBuilder {
    pub fn new(store: DynDictDataStore) -> Self {
        Self { store }
    }

    /// Returns a new snapshot if the store changed since `watermark`.
    ///
    /// With no watermark the store is loaded unconditionally. Otherwise a
    /// cheap existence check runs first and the full fetch only happens when
    /// it reports a newer row. The snapshot's watermark covers deleted rows,
    /// so a delete is seen exactly once. An empty full fetch yields `None`.
    ///
    /// # Errors
    ///
    /// Propagates any store failure. The caller keeps its current snapshot.
    pub async fn build_if_stale(
        &self,
        watermark: Option<OffsetDateTime>,
    ) -> Result<Option<DictSnapshot>, StorageError> {
        match watermark {
            None => tracing::info!(
                backend = self.store.backend_name(),
                "Loading all dictionary data"
            ),
            Some(ts) => {
                if !self.store.exists_updated_after(ts).await? {
                    tracing::trace!(watermark = %ts, "Dictionary data unchanged");
                    return Ok(None);
                }
                tracing::info!(watermark = %ts, "Dictionary data changed, reloading");
            }
        }

        // Read before the fetch: a write landing in between is picked up by
        // the fetch or by the next probe, never skipped.
        let store_watermark = self.store.max_update_time().await?;
        let entries = self.store.fetch_all().await?;
        let Some(snapshot) = DictSnapshot::build(entries, store_watermark) else {
            tracing::warn!(
                watermark = ?watermark,
                "Refresh fetched no dictionary data, keeping current snapshot"
            );
            return Ok(None);
        };

        if snapshot.duplicates() > 0 {
            tracing::warn!(
                duplicates = snapshot.duplicates(),
                "Duplicate dictionary keys in store, newest entry kept"
            );
        }
        tracing::info!(
            entries = snapshot.len(),
            types = snapshot.type_count(),
            watermark = %snapshot.max_update_time(),
            "Built dictionary snapshot"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStore;
    use dictsync_storage::{DictDataStore, NewDictData};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_build_loads_without_probe() {
        let store = Arc::new(RecordingStore::new());
        store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        let builder = SnapshotBuilder::new(store.clone());

        let snapshot = builder.build_if_stale(None).await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.exists_calls(), 0);
        assert_eq!(store.fetch_all_calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_store_skips_full_fetch() {
        let store = Arc::new(RecordingStore::new());
        store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        let builder = SnapshotBuilder::new(store.clone());

        let first = builder.build_if_stale(None).await.unwrap().unwrap();
        let second = builder
            .build_if_stale(Some(first.max_update_time()))
            .await
            .unwrap();

        assert!(second.is_none());
        assert_eq!(store.exists_calls(), 1);
        assert_eq!(store.fetch_all_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_store_rebuilds_everything() {
        let store = Arc::new(RecordingStore::new());
        store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        let builder = SnapshotBuilder::new(store.clone());
        let first = builder.build_if_stale(None).await.unwrap().unwrap();

        store
            .insert(&NewDictData::new("gender", "Female", "2"))
            .await
            .unwrap();
        let second = builder
            .build_if_stale(Some(first.max_update_time()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.len(), 2);
        assert!(second.max_update_time() > first.max_update_time());
        assert!(second.get_by_value("gender", "1").is_some());
    }

    #[tokio::test]
    async fn test_empty_store_yields_nothing() {
        let store = Arc::new(RecordingStore::new());
        let builder = SnapshotBuilder::new(store.clone());

        assert!(builder.build_if_stale(None).await.unwrap().is_none());
        assert_eq!(store.fetch_all_calls(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(RecordingStore::new());
        store.fail_next(1);
        let builder = SnapshotBuilder::new(store.clone());

        let err = builder.build_if_stale(None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_deleting_newest_entry_advances_watermark() {
        let store = Arc::new(RecordingStore::new());
        store
            .insert(&NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();
        let female = store
            .insert(&NewDictData::new("gender", "Female", "2"))
            .await
            .unwrap();
        let builder = SnapshotBuilder::new(store.clone());
        let first = builder.build_if_stale(None).await.unwrap().unwrap();

        assert!(store.delete_by_id(female.id).await.unwrap());
        let second = builder
            .build_if_stale(Some(first.max_update_time()))
            .await
            .unwrap()
            .unwrap();

        assert!(second.max_update_time() > first.max_update_time());
        assert!(second.get_by_value("gender", "2").is_none());
        assert_eq!(second.len(), 1);

        // The tombstone is covered, so the next probe reports no change.
        let third = builder
            .build_if_stale(Some(second.max_update_time()))
            .await
            .unwrap();
        assert!(third.is_none());
        assert_eq!(store.fetch_all_calls(), 2);
    }
}
