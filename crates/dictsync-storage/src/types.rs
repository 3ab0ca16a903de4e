//! Data model for dictionary entries and the queries that list them.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StorageError;

/// Enabled/disabled flag shared by dictionary entries and dictionary types.
///
/// Persisted as a small integer: `0` enabled, `1` disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommonStatus {
    #[default]
    Enabled,
    Disabled,
}

impl CommonStatus {
    /// Returns the persisted code for this status.
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
        }
    }

    /// Decodes a persisted status code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidData` for codes other than 0 and 1.
    pub fn from_code(code: i16) -> Result<Self, StorageError> {
        match code {
            0 => Ok(Self::Enabled),
            1 => Ok(Self::Disabled),
            other => Err(StorageError::invalid_data(format!(
                "unknown status code {other}"
            ))),
        }
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for CommonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// One dictionary entry as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictData {
    /// Store-assigned identifier, immutable once assigned.
    pub id: i64,
    /// Grouping key, e.g. `user_status`.
    pub dict_type: String,
    /// Human readable text.
    pub label: String,
    /// Machine value.
    pub value: String,
    /// Display order within the type.
    pub sort: i32,
    pub status: CommonStatus,
    pub remark: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub create_time: OffsetDateTime,
    /// Time of the last mutation. Never decreases for a given entry.
    #[serde(with = "time::serde::rfc3339")]
    pub update_time: OffsetDateTime,
}

impl DictData {
    /// Orders entries by `(dict_type, sort)`, then by `id` so the order is total.
    #[must_use]
    pub fn cmp_type_and_sort(&self, other: &Self) -> Ordering {
        self.dict_type
            .cmp(&other.dict_type)
            .then(self.sort.cmp(&other.sort))
            .then(self.id.cmp(&other.id))
    }
}

/// Sorts entries in place by `(dict_type, sort)`.
pub fn sort_by_type_and_sort(entries: &mut [DictData]) {
    entries.sort_by(DictData::cmp_type_and_sort);
}

/// Business fields of an entry to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDictData {
    pub dict_type: String,
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub status: CommonStatus,
    #[serde(default)]
    pub remark: Option<String>,
}

impl NewDictData {
    /// Creates an enabled entry with sort order 0.
    #[must_use]
    pub fn new(
        dict_type: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            dict_type: dict_type.into(),
            label: label.into(),
            value: value.into(),
            sort: 0,
            status: CommonStatus::Enabled,
            remark: None,
        }
    }

    #[must_use]
    pub fn with_sort(mut self, sort: i32) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: CommonStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }
}

/// Full replacement of an existing entry's business fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictDataUpdate {
    pub id: i64,
    pub dict_type: String,
    pub label: String,
    pub value: String,
    pub sort: i32,
    pub status: CommonStatus,
    pub remark: Option<String>,
}

impl DictDataUpdate {
    /// Builds an update that rewrites entry `id` with the given fields.
    #[must_use]
    pub fn from_new(id: i64, fields: NewDictData) -> Self {
        Self {
            id,
            dict_type: fields.dict_type,
            label: fields.label,
            value: fields.value,
            sort: fields.sort,
            status: fields.status,
            remark: fields.remark,
        }
    }
}

/// Dictionary type as seen by the dictionary data service.
///
/// Types are owned by a separate collaborator; only the status matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictTypeInfo {
    pub dict_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: CommonStatus,
}

impl DictTypeInfo {
    #[must_use]
    pub fn new(dict_type: impl Into<String>, status: CommonStatus) -> Self {
        let dict_type = dict_type.into();
        Self {
            name: dict_type.clone(),
            dict_type,
            status,
        }
    }
}

/// Filter for listing and exporting entries straight from the store.
///
/// `label` is a substring match; `dict_type` and `status` are exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictDataFilter {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub dict_type: Option<String>,
    #[serde(default)]
    pub status: Option<CommonStatus>,
}

impl DictDataFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_dict_type(mut self, dict_type: impl Into<String>) -> Self {
        self.dict_type = Some(dict_type.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: CommonStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if `entry` satisfies every criterion that is set.
    #[must_use]
    pub fn matches(&self, entry: &DictData) -> bool {
        if let Some(label) = &self.label
            && !entry.label.contains(label.as_str())
        {
            return false;
        }
        if let Some(dict_type) = &self.dict_type
            && entry.dict_type != *dict_type
        {
            return false;
        }
        if let Some(status) = self.status
            && entry.status != status
        {
            return false;
        }
        true
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParam {
    pub page_no: u32,
    pub page_size: u32,
}

impl PageParam {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Creates a page request; zero values are clamped to 1.
    #[must_use]
    pub fn new(page_no: u32, page_size: u32) -> Self {
        Self {
            page_no: page_no.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page_no.saturating_sub(1)) * u64::from(self.page_size)
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageParam {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub list: Vec<T>,
    pub total: u64,
}

impl<T> PageResult<T> {
    #[must_use]
    pub fn new(list: Vec<T>, total: u64) -> Self {
        Self { list, total }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
