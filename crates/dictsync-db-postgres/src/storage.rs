//! PostgreSQL implementation of the dictionary record store.
//!
//! Every mutation runs in a transaction that first takes a transaction-scoped
//! advisory lock. Writers are therefore serialized, and
//! `system_dict_data_next_update_time()` hands out timestamps in commit
//! order, which the staleness probe relies on.

use async_trait::async_trait;
use dictsync_storage::{
    CommonStatus, DictData, DictDataFilter, DictDataStore, DictDataUpdate, DictTypeInfo,
    DictTypeStore, NewDictData, PageParam, PageResult, StorageError,
};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;

use crate::error::storage_error;

/// Advisory lock key guarding dictionary data writes.
const WRITE_LOCK_KEY: i64 = 0x6469_6374_6461_7461; // "dictdata"

const COLUMNS: &str =
    "id, dict_type, label, value, sort, status, remark, create_time, update_time";

type DictRow = (
    i64,
    String,
    String,
    String,
    i32,
    i16,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

fn from_row(row: DictRow) -> Result<DictData, StorageError> {
    Ok(DictData {
        id: row.0,
        dict_type: row.1,
        label: row.2,
        value: row.3,
        sort: row.4,
        status: CommonStatus::from_code(row.5)?,
        remark: row.6,
        create_time: row.7,
        update_time: row.8,
    })
}

fn from_rows(rows: Vec<DictRow>) -> Result<Vec<DictData>, StorageError> {
    rows.into_iter().map(from_row).collect()
}

fn page_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Dictionary data store backed by the `system_dict_data` table.
#[derive(Debug, Clone)]
pub struct PostgresDictStore {
    pool: PgPool,
}

impl PostgresDictStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_one(
        &self,
        condition: &str,
        binds: &[&str],
    ) -> Result<Option<DictData>, StorageError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM system_dict_data WHERE NOT deleted AND {condition} ORDER BY id LIMIT 1"
        );
        let mut q = query_as::<_, DictRow>(&sql);
        for bind in binds {
            q = q.bind(*bind);
        }
        let row = q.fetch_optional(&self.pool).await.map_err(storage_error)?;
        row.map(from_row).transpose()
    }
}

#[async_trait]
impl DictDataStore for PostgresDictStore {
    async fn exists_updated_after(&self, ts: OffsetDateTime) -> Result<bool, StorageError> {
        query_scalar("SELECT EXISTS (SELECT 1 FROM system_dict_data WHERE update_time > $1)")
            .bind(ts)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn max_update_time(&self) -> Result<Option<OffsetDateTime>, StorageError> {
        query_scalar("SELECT MAX(update_time) FROM system_dict_data")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn fetch_all(&self) -> Result<Vec<DictData>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM system_dict_data WHERE NOT deleted");
        let rows: Vec<DictRow> = query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        from_rows(rows)
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<DictData>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM system_dict_data WHERE id = $1 AND NOT deleted");
        let row: Option<DictRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.map(from_row).transpose()
    }

    async fn fetch_by_label(&self, label: &str) -> Result<Option<DictData>, StorageError> {
        self.find_one("label = $1", &[label]).await
    }

    async fn fetch_by_type_and_label(
        &self,
        dict_type: &str,
        label: &str,
    ) -> Result<Option<DictData>, StorageError> {
        self.find_one("dict_type = $1 AND label = $2", &[dict_type, label])
            .await
    }

    async fn insert(&self, entry: &NewDictData) -> Result<DictData, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        query("SELECT pg_advisory_xact_lock($1)")
            .bind(WRITE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let sql = format!(
            r#"
            WITH ts AS (SELECT system_dict_data_next_update_time() AS stamp)
            INSERT INTO system_dict_data
                (dict_type, label, value, sort, status, remark, create_time, update_time)
            SELECT $1, $2, $3, $4, $5, $6, ts.stamp, ts.stamp FROM ts
            RETURNING {COLUMNS}
            "#
        );
        let row: DictRow = query_as(&sql)
            .bind(&entry.dict_type)
            .bind(&entry.label)
            .bind(&entry.value)
            .bind(entry.sort)
            .bind(entry.status.code())
            .bind(&entry.remark)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        from_row(row)
    }

    async fn update_by_id(&self, update: &DictDataUpdate) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        query("SELECT pg_advisory_xact_lock($1)")
            .bind(WRITE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let result = query(
            r#"
            UPDATE system_dict_data
            SET dict_type = $2,
                label = $3,
                value = $4,
                sort = $5,
                status = $6,
                remark = $7,
                update_time = system_dict_data_next_update_time()
            WHERE id = $1
              AND NOT deleted
            "#,
        )
        .bind(update.id)
        .bind(&update.dict_type)
        .bind(&update.label)
        .bind(&update.value)
        .bind(update.sort)
        .bind(update.status.code())
        .bind(&update.remark)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        query("SELECT pg_advisory_xact_lock($1)")
            .bind(WRITE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let result = query(
            r#"
            UPDATE system_dict_data
            SET deleted = TRUE,
                update_time = system_dict_data_next_update_time()
            WHERE id = $1
              AND NOT deleted
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_type(&self, dict_type: &str) -> Result<u64, StorageError> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM system_dict_data WHERE dict_type = $1 AND NOT deleted",
        )
        .bind(dict_type)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch_page(
        &self,
        filter: &DictDataFilter,
        page: PageParam,
    ) -> Result<PageResult<DictData>, StorageError> {
        let status = filter.status.map(CommonStatus::code);

        let total: i64 = query_scalar(&format!(
            "SELECT COUNT(*) FROM system_dict_data WHERE {FILTER}"
        ))
        .bind(&filter.label)
        .bind(&filter.dict_type)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        let sql = format!(
            "SELECT {COLUMNS} FROM system_dict_data WHERE {FILTER} {ORDER} LIMIT $4 OFFSET $5"
        );
        let rows: Vec<DictRow> = query_as(&sql)
            .bind(&filter.label)
            .bind(&filter.dict_type)
            .bind(status)
            .bind(page_bound(page.limit()))
            .bind(page_bound(page.offset()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(PageResult::new(
            from_rows(rows)?,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    async fn fetch_filtered(&self, filter: &DictDataFilter) -> Result<Vec<DictData>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM system_dict_data WHERE {FILTER} {ORDER}");
        let rows: Vec<DictRow> = query_as(&sql)
            .bind(&filter.label)
            .bind(&filter.dict_type)
            .bind(filter.status.map(CommonStatus::code))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        from_rows(rows)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Shared filter clause: `$1` label substring, `$2` type, `$3` status code.
const FILTER: &str = "NOT deleted \
    AND ($1::text IS NULL OR strpos(label, $1) > 0) \
    AND ($2::text IS NULL OR dict_type = $2) \
    AND ($3::smallint IS NULL OR status = $3)";

/// Byte-wise type order, matching `DictData::cmp_type_and_sort`.
const ORDER: &str = "ORDER BY dict_type COLLATE \"C\", sort, id";

/// Dictionary type lookup backed by the `system_dict_type` table.
#[derive(Debug, Clone)]
pub struct PostgresDictTypeStore {
    pool: PgPool,
}

impl PostgresDictTypeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn upsert_type(&self, info: &DictTypeInfo) -> Result<(), StorageError> {
        query(
            r#"
            INSERT INTO system_dict_type (dict_type, name, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (dict_type) DO UPDATE
            SET name = EXCLUDED.name,
                status = EXCLUDED.status
            "#,
        )
        .bind(&info.dict_type)
        .bind(&info.name)
        .bind(info.status.code())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl DictTypeStore for PostgresDictTypeStore {
    async fn get_type(&self, dict_type: &str) -> Result<Option<DictTypeInfo>, StorageError> {
        let row: Option<(String, String, i16)> =
            query_as("SELECT dict_type, name, status FROM system_dict_type WHERE dict_type = $1")
                .bind(dict_type)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        row.map(|(dict_type, name, status)| {
            Ok(DictTypeInfo {
                dict_type,
                name,
                status: CommonStatus::from_code(status)?,
            })
        })
        .transpose()
    }
}
