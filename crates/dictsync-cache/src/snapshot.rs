//! Immutable point-in-time view of all dictionary entries.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use dictsync_storage::DictData;
use time::OffsetDateTime;

/// Inner table: key within a dictionary type to entry.
type TypeTable = HashMap<String, DictData>;

/// Materialized dictionary data indexed by `(dict_type, label)` and
/// `(dict_type, value)`.
///
/// A snapshot is never mutated after [`DictSnapshot::build`] returns. Each
/// refresh produces a new one that replaces the old one in the cache.
#[derive(Debug, Clone)]
pub struct DictSnapshot {
    by_label: HashMap<String, TypeTable>,
    by_value: HashMap<String, TypeTable>,
    max_update_time: OffsetDateTime,
    built_at: OffsetDateTime,
    entries: usize,
    duplicates: usize,
}

impl DictSnapshot {
    /// Builds a snapshot from a full fetch.
    ///
    /// `store_watermark` is the store's greatest `update_time` including
    /// deleted entries, read before the fetch. The snapshot's watermark is the
    /// later of it and the newest fetched entry. Returns `None` for an empty
    /// list.
    ///
    /// When two entries collide on `(dict_type, label)` or
    /// `(dict_type, value)`, the one with the greater `update_time` wins, then
    /// the greater `id`. The number of collisions is reported by
    /// [`DictSnapshot::duplicates`].
    #[must_use]
    pub fn build(
        entries: Vec<DictData>,
        store_watermark: Option<OffsetDateTime>,
    ) -> Option<Self> {
        let newest = entries.iter().map(|e| e.update_time).max()?;
        let max_update_time = store_watermark.map_or(newest, |ts| ts.max(newest));
        let count = entries.len();

        let mut by_label: HashMap<String, TypeTable> = HashMap::new();
        let mut by_value: HashMap<String, TypeTable> = HashMap::new();
        let mut duplicates = 0;

        for entry in entries {
            let label_table = by_label.entry(entry.dict_type.clone()).or_default();
            if !insert_newest(label_table, entry.label.clone(), entry.clone()) {
                duplicates += 1;
            }
            let value_table = by_value.entry(entry.dict_type.clone()).or_default();
            if !insert_newest(value_table, entry.value.clone(), entry) {
                duplicates += 1;
            }
        }

        Some(Self {
            by_label,
            by_value,
            max_update_time,
            built_at: OffsetDateTime::now_utc(),
            entries: count,
            duplicates,
        })
    }

    /// Point lookup by machine value.
    #[must_use]
    pub fn get_by_value(&self, dict_type: &str, value: &str) -> Option<&DictData> {
        self.by_value.get(dict_type)?.get(value)
    }

    /// Point lookup by label.
    #[must_use]
    pub fn get_by_label(&self, dict_type: &str, label: &str) -> Option<&DictData> {
        self.by_label.get(dict_type)?.get(label)
    }

    /// All entries of a type, in no particular order.
    pub fn list_by_type<'a>(&'a self, dict_type: &str) -> impl Iterator<Item = &'a DictData> + 'a {
        self.by_label
            .get(dict_type)
            .into_iter()
            .flat_map(|table| table.values())
    }

    /// Refresh watermark: no store mutation at or before it is missing.
    #[must_use]
    pub fn max_update_time(&self) -> OffsetDateTime {
        self.max_update_time
    }

    #[must_use]
    pub fn built_at(&self) -> OffsetDateTime {
        self.built_at
    }

    /// Number of entries the snapshot was built from.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Number of distinct dictionary types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.by_label.len()
    }

    /// Number of key collisions resolved while building.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// Inserts `entry` unless the table already holds a newer one under `key`.
///
/// Returns `false` when the key was already taken.
fn insert_newest(table: &mut TypeTable, key: String, entry: DictData) -> bool {
    match table.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(entry);
            true
        }
        Entry::Occupied(mut slot) => {
            let current = slot.get();
            if (entry.update_time, entry.id) > (current.update_time, current.id) {
                slot.insert(entry);
            }
            false
        }
    }
}
