//! src/services/metadata_store.rs
//!
//! Metadata records live in a single SQLite table keyed by
//! (`partition_key`, `row_key`). The table name comes from configuration, so it
//! is validated once and then spliced into each statement.

use crate::{
    models::media_record::MediaRecord,
    services::error::{MediaError, MediaResult},
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

const TABLE_NAME_MIN_LEN: usize = 3;
const TABLE_NAME_MAX_LEN: usize = 63;

/// Durable storage for [`MediaRecord`]s.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create the backing table. Succeeds when it already exists.
    async fn ensure_table_exists(&self) -> MediaResult<()>;

    /// Insert or replace the record stored under (`partition`, `key`).
    async fn upsert(&self, record: &MediaRecord) -> MediaResult<()>;

    /// Every record in the collection, in store order.
    async fn scan_all(&self) -> MediaResult<Vec<MediaRecord>>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> MediaResult<()>;
}

/// SQLite-backed metadata store.
#[derive(Clone, Debug)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
    table: String,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>, table: impl Into<String>) -> MediaResult<Self> {
        let table = table.into();
        ensure_table_name_safe(&table)?;
        Ok(Self { db, table })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn ensure_table_exists(&self) -> MediaResult<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                partition_key TEXT NOT NULL,
                row_key       TEXT NOT NULL,
                description   TEXT NOT NULL DEFAULT '',
                blob_url      TEXT NOT NULL,
                file_name     TEXT NOT NULL,
                timestamp     TEXT,
                UNIQUE (partition_key, row_key)
            )
            "#,
            self.table
        );
        sqlx::query(&ddl).execute(&*self.db).await?;
        info!("table {} ready", self.table);
        Ok(())
    }

    async fn upsert(&self, record: &MediaRecord) -> MediaResult<()> {
        let sql = format!(
            r#"
            INSERT INTO "{}" (
                partition_key, row_key, description, blob_url, file_name, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(partition_key, row_key) DO UPDATE SET
                description = excluded.description,
                blob_url = excluded.blob_url,
                file_name = excluded.file_name,
                timestamp = excluded.timestamp
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(&record.partition)
            .bind(&record.key)
            .bind(&record.description)
            .bind(&record.blob_url)
            .bind(&record.file_name)
            .bind(record.timestamp.as_deref())
            .execute(&*self.db)
            .await?;
        debug!("upserted {}/{} into {}", record.partition, record.key, self.table);
        Ok(())
    }

    async fn scan_all(&self) -> MediaResult<Vec<MediaRecord>> {
        let sql = format!(
            r#"SELECT partition_key, row_key, description, blob_url, file_name, timestamp
               FROM "{}""#,
            self.table
        );
        let rows = sqlx::query_as::<_, MediaRecord>(&sql)
            .fetch_all(&*self.db)
            .await?;
        debug!("scanned {} records from {}", rows.len(), self.table);
        Ok(rows)
    }

    async fn health_check(&self) -> MediaResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(MediaError::metadata_unavailable(format!(
                "unexpected probe result: {}",
                one
            )));
        }
        Ok(())
    }
}

/// Table names: 3–63 ASCII letters or digits, starting with a letter.
pub fn ensure_table_name_safe(name: &str) -> MediaResult<()> {
    let len = name.len();
    let valid = (TABLE_NAME_MIN_LEN..=TABLE_NAME_MAX_LEN).contains(&len)
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(MediaError::InvalidTableName(name.to_string()))
    }
}
