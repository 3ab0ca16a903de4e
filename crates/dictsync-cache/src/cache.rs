//! Holds the active snapshot and serves lookups from it.
//!
//! Reads load the current snapshot pointer without taking a lock and never
//! wait for a refresh. Before the first publish every lookup returns nothing.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dictsync_storage::DictData;
use time::OffsetDateTime;

use crate::snapshot::DictSnapshot;

/// Lock-free holder of the active [`DictSnapshot`].
///
/// Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct DictCache {
    current: Arc<ArcSwapOption<DictSnapshot>>,
}

impl DictCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active snapshot.
    ///
    /// The swap is rejected when `snapshot` is older than the active one, so
    /// two refreshes finishing out of order cannot move the watermark
    /// backwards. Returns whether the snapshot became active.
    pub fn publish(&self, snapshot: DictSnapshot) -> bool {
        let next = Arc::new(snapshot);
        let mut accepted = false;
        self.current.rcu(|current| {
            accepted = current
                .as_ref()
                .is_none_or(|active| next.max_update_time() >= active.max_update_time());
            if accepted {
                Some(Arc::clone(&next))
            } else {
                current.clone()
            }
        });
        if !accepted {
            tracing::debug!(
                watermark = %next.max_update_time(),
                "Rejected snapshot older than the active one"
            );
        }
        accepted
    }

    /// Returns the active snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<DictSnapshot>> {
        self.current.load_full()
    }

    /// Returns `true` once a snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// Watermark of the active snapshot.
    pub fn current_watermark(&self) -> Option<OffsetDateTime> {
        self.current
            .load()
            .as_ref()
            .map(|snapshot| snapshot.max_update_time())
    }

    pub fn lookup_by_value(&self, dict_type: &str, value: &str) -> Option<DictData> {
        self.current
            .load()
            .as_ref()?
            .get_by_value(dict_type, value)
            .cloned()
    }

    pub fn lookup_by_label(&self, dict_type: &str, label: &str) -> Option<DictData> {
        self.current
            .load()
            .as_ref()?
            .get_by_label(dict_type, label)
            .cloned()
    }

    /// All entries of a type, in no particular order.
    pub fn list_by_type(&self, dict_type: &str) -> Vec<DictData> {
        match self.current.load().as_ref() {
            Some(snapshot) => snapshot.list_by_type(dict_type).cloned().collect(),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for DictCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.current.load();
        f.debug_struct("DictCache")
            .field("ready", &guard.is_some())
            .field("entries", &guard.as_ref().map(|s| s.len()))
            .field("watermark", &guard.as_ref().map(|s| s.max_update_time()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::entry;
    use std::thread;

    fn snapshot_of(entries: Vec<DictData>) -> DictSnapshot {
        DictSnapshot::build(entries, None).unwrap()
    }

    #[test]
    fn test_empty_cache_returns_nothing() {
        let cache = DictCache::new();
        assert!(!cache.is_ready());
        assert!(cache.current_watermark().is_none());
        assert!(cache.lookup_by_value("gender", "1").is_none());
        assert!(cache.lookup_by_label("gender", "Male").is_none());
        assert!(cache.list_by_type("gender").is_empty());
    }

    #[test]
    fn test_publish_and_lookup() {
        let cache = DictCache::new();
        let snapshot = snapshot_of(vec![entry(1, "gender", "Male", "1")]);
        let watermark = snapshot.max_update_time();

        assert!(cache.publish(snapshot));
        assert!(cache.is_ready());
        assert_eq!(cache.current_watermark(), Some(watermark));
        assert_eq!(cache.lookup_by_value("gender", "1").unwrap().label, "Male");
        assert_eq!(cache.lookup_by_label("gender", "Male").unwrap().id, 1);
        assert!(cache.lookup_by_value("gender", "2").is_none());
    }

    #[test]
    fn test_publish_rejects_older_snapshot() {
        let cache = DictCache::new();
        let newer = snapshot_of(vec![entry(5, "gender", "Male", "1")]);
        let older = snapshot_of(vec![entry(2, "gender", "Female", "2")]);

        assert!(cache.publish(newer));
        assert!(!cache.publish(older));
        assert!(cache.lookup_by_value("gender", "2").is_none());
        assert_eq!(cache.lookup_by_value("gender", "1").unwrap().id, 5);
    }

    #[test]
    fn test_publish_accepts_equal_watermark() {
        let cache = DictCache::new();
        let first = snapshot_of(vec![entry(3, "gender", "Male", "1")]);
        let same = snapshot_of(vec![entry(3, "gender", "Man", "1")]);

        assert!(cache.publish(first));
        assert!(cache.publish(same));
        assert_eq!(cache.lookup_by_value("gender", "1").unwrap().label, "Man");
    }

    #[test]
    fn test_clones_share_snapshot() {
        let cache = DictCache::new();
        let reader = cache.clone();
        cache.publish(snapshot_of(vec![entry(1, "gender", "Male", "1")]));
        assert!(reader.is_ready());
    }

    #[test]
    fn test_watermark_never_decreases_under_concurrent_publish() {
        let cache = DictCache::new();
        let writers: Vec<_> = (1..=8)
            .map(|id| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for round in 0..50 {
                        let id = id * 100 + round;
                        let snapshot = snapshot_of(vec![entry(id, "gender", "Male", "1")]);
                        cache.publish(snapshot);
                    }
                })
            })
            .collect();

        let reader = {
            let cache = cache.clone();
            thread::spawn(move || {
                let mut last = None;
                for _ in 0..2000 {
                    let current = cache.current_watermark();
                    assert!(current >= last);
                    last = current;
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(cache.lookup_by_value("gender", "1").unwrap().id, 849);
    }
}
