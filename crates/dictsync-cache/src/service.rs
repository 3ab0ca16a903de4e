//! Write path and read surface for dictionary data.
//!
//! Mutations go straight to the record store and are followed by a change
//! notification. The service never touches the cache on write: every
//! process, the writer included, picks the change up through its own
//! refresh scheduler.

use dictsync_storage::{
    DictData, DictDataFilter, DictDataUpdate, DynDictDataStore, DynDictTypeStore, NewDictData,
    PageParam, PageResult, sort_by_type_and_sort,
};
use serde::{Deserialize, Serialize};

use crate::cache::DictCache;
use crate::error::{DictError, DictResult};
use crate::notifier::DynChangeNotifier;

/// Where a label must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelScope {
    /// No two entries of any type share a label.
    #[default]
    Global,
    /// Labels are unique within a dictionary type, like the snapshot keys.
    PerType,
}

/// Dictionary data service.
pub struct DictDataService {
    store: DynDictDataStore,
    types: DynDictTypeStore,
    cache: DictCache,
    notifier: DynChangeNotifier,
    label_scope: LabelScope,
}

impl DictDataService {
    #[must_use]
    pub fn new(
        store: DynDictDataStore,
        types: DynDictTypeStore,
        cache: DictCache,
        notifier: DynChangeNotifier,
    ) -> Self {
        Self {
            store,
            types,
            cache,
            notifier,
            label_scope: LabelScope::default(),
        }
    }

    #[must_use]
    pub fn with_label_scope(mut self, label_scope: LabelScope) -> Self {
        self.label_scope = label_scope;
        self
    }

    #[must_use]
    pub fn label_scope(&self) -> LabelScope {
        self.label_scope
    }

    // ---------------------------------------------------------------------
    // Write path
    // ---------------------------------------------------------------------

    /// Creates an entry and returns its id.
    ///
    /// # Errors
    ///
    /// `LabelDuplicate`, `TypeNotFound` or `TypeDisabled` when validation
    /// fails. No row is written then.
    pub async fn create_dict_data(&self, request: NewDictData) -> DictResult<i64> {
        self.validate(None, &request.label, &request.dict_type)
            .await?;
        let created = self.store.insert(&request).await?;
        tracing::info!(
            id = created.id,
            dict_type = %created.dict_type,
            label = %created.label,
            "Created dictionary data"
        );
        self.notify_changed().await;
        Ok(created.id)
    }

    /// Rewrites an existing entry.
    ///
    /// # Errors
    ///
    /// `DataNotFound` when the id does not exist, otherwise as for
    /// [`create_dict_data`](Self::create_dict_data).
    pub async fn update_dict_data(&self, request: DictDataUpdate) -> DictResult<()> {
        self.validate(Some(request.id), &request.label, &request.dict_type)
            .await?;
        if !self.store.update_by_id(&request).await? {
            return Err(DictError::data_not_found(request.id));
        }
        tracing::info!(
            id = request.id,
            dict_type = %request.dict_type,
            "Updated dictionary data"
        );
        self.notify_changed().await;
        Ok(())
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// `DataNotFound` when the id does not exist.
    pub async fn delete_dict_data(&self, id: i64) -> DictResult<()> {
        self.check_exists(id).await?;
        if !self.store.delete_by_id(id).await? {
            return Err(DictError::data_not_found(id));
        }
        tracing::info!(id, "Deleted dictionary data");
        self.notify_changed().await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Store-backed reads
    // ---------------------------------------------------------------------

    pub async fn get_dict_data(&self, id: i64) -> DictResult<Option<DictData>> {
        Ok(self.store.fetch_by_id(id).await?)
    }

    /// All entries sorted by `(dict_type, sort)`.
    pub async fn list_dict_datas(&self) -> DictResult<Vec<DictData>> {
        let mut list = self.store.fetch_all().await?;
        sort_by_type_and_sort(&mut list);
        Ok(list)
    }

    pub async fn page_dict_datas(
        &self,
        filter: &DictDataFilter,
        page: PageParam,
    ) -> DictResult<PageResult<DictData>> {
        Ok(self.store.fetch_page(filter, page).await?)
    }

    /// Entries matching `filter` sorted by `(dict_type, sort)`, for export.
    pub async fn list_dict_datas_filtered(
        &self,
        filter: &DictDataFilter,
    ) -> DictResult<Vec<DictData>> {
        let mut list = self.store.fetch_filtered(filter).await?;
        sort_by_type_and_sort(&mut list);
        Ok(list)
    }

    pub async fn count_by_dict_type(&self, dict_type: &str) -> DictResult<u64> {
        Ok(self.store.count_by_type(dict_type).await?)
    }

    // ---------------------------------------------------------------------
    // Cache-backed reads
    // ---------------------------------------------------------------------

    /// Translates a machine value to its entry.
    #[must_use]
    pub fn get_dict_data_from_cache(&self, dict_type: &str, value: &str) -> Option<DictData> {
        self.cache.lookup_by_value(dict_type, value)
    }

    /// Translates a label back to its entry.
    #[must_use]
    pub fn parse_dict_data_from_cache(&self, dict_type: &str, label: &str) -> Option<DictData> {
        self.cache.lookup_by_label(dict_type, label)
    }

    /// Entries of a type in display order.
    #[must_use]
    pub fn list_dict_datas_from_cache(&self, dict_type: &str) -> Vec<DictData> {
        let mut list = self.cache.list_by_type(dict_type);
        list.sort_by(DictData::cmp_type_and_sort);
        list
    }

    #[must_use]
    pub fn cache(&self) -> &DictCache {
        &self.cache
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    async fn validate(&self, id: Option<i64>, label: &str, dict_type: &str) -> DictResult<()> {
        if let Some(id) = id {
            self.check_exists(id).await?;
        }
        self.check_label_unique(id, label, dict_type).await?;
        self.check_type_valid(dict_type).await
    }

    async fn check_exists(&self, id: i64) -> DictResult<()> {
        match self.store.fetch_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(DictError::data_not_found(id)),
        }
    }

    async fn check_label_unique(
        &self,
        id: Option<i64>,
        label: &str,
        dict_type: &str,
    ) -> DictResult<()> {
        let existing = match self.label_scope {
            LabelScope::Global => self.store.fetch_by_label(label).await?,
            LabelScope::PerType => self.store.fetch_by_type_and_label(dict_type, label).await?,
        };
        match existing {
            Some(found) if id != Some(found.id) => {
                Err(DictError::label_duplicate(found.dict_type, label))
            }
            _ => Ok(()),
        }
    }

    async fn check_type_valid(&self, dict_type: &str) -> DictResult<()> {
        match self.types.get_type(dict_type).await? {
            None => Err(DictError::type_not_found(dict_type)),
            Some(info) if !info.status.is_enabled() => Err(DictError::type_disabled(dict_type)),
            Some(_) => Ok(()),
        }
    }

    async fn notify_changed(&self) {
        if let Err(e) = self.notifier.publish().await {
            tracing::warn!(
                error = %e,
                "Failed to publish dictionary change, peers will catch up on their timer"
            );
        }
    }
}
