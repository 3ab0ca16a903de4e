use std::sync::Arc;

use async_trait::async_trait;
use dictsync_storage::{DictTypeInfo, DictTypeStore, StorageError};
use papaya::HashMap as PapayaHashMap;

/// In-memory registry of dictionary types.
///
/// Stands in for the type management collaborator when no database is
/// configured. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDictTypeStore {
    types: Arc<PapayaHashMap<String, DictTypeInfo>>,
}

impl InMemoryDictTypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with `types`.
    pub fn with_types(types: impl IntoIterator<Item = DictTypeInfo>) -> Self {
        let store = Self::new();
        for info in types {
            store.put(info);
        }
        store
    }

    /// Inserts or replaces a type.
    pub fn put(&self, info: DictTypeInfo) {
        self.types.pin().insert(info.dict_type.clone(), info);
    }

    /// Removes a type, returning it if it was present.
    pub fn remove(&self, dict_type: &str) -> Option<DictTypeInfo> {
        self.types.pin().remove(dict_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DictTypeStore for InMemoryDictTypeStore {
    async fn get_type(&self, dict_type: &str) -> Result<Option<DictTypeInfo>, StorageError> {
        Ok(self.types.pin().get(dict_type).cloned())
    }
}
