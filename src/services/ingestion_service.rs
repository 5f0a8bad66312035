//! IngestionService: writes an image to the blob store, then links it from a
//! metadata record.
//!
//! The blob is always written first. A failed blob write leaves the metadata
//! untouched; a failed upsert after a successful blob write leaves the blob in
//! place (it is keyed by file name, so a retry re-links it) and reports the
//! failure to the caller.

use crate::{
    models::media_record::MediaRecord,
    services::{
        blob_store::{BlobStore, ensure_key_safe},
        error::{MediaError, MediaResult},
        metadata_store::MetadataStore,
    },
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub blob_url: String,
    pub record: MediaRecord,
}

#[derive(Clone)]
pub struct IngestionService {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    partition: String,
}

impl IngestionService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            metadata,
            partition: partition.into(),
        }
    }

    /// Ingest an image, stamping it with the current UTC time.
    pub async fn ingest(
        &self,
        bytes: Bytes,
        file_name: &str,
        description: &str,
    ) -> MediaResult<IngestOutcome> {
        self.ingest_at(bytes, file_name, description, Utc::now())
            .await
    }

    /// Ingest an image recorded at `now`.
    pub async fn ingest_at(
        &self,
        bytes: Bytes,
        file_name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> MediaResult<IngestOutcome> {
        let key = record_key(file_name)?;

        let blob_url = self.blobs.put(&key, bytes).await.map_err(|err| {
            error!("blob write for {} failed, no record written: {}", key, err);
            err
        })?;

        let record = MediaRecord {
            partition: self.partition.clone(),
            key: key.clone(),
            description: description.to_string(),
            blob_url: blob_url.clone(),
            file_name: key.clone(),
            timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Micros, true)),
        };

        self.metadata.upsert(&record).await.map_err(|err| {
            error!("metadata upsert for {} failed after blob write: {}", key, err);
            err
        })?;

        info!("ingested {} as {}", key, blob_url);
        Ok(IngestOutcome { blob_url, record })
    }
}

/// Derive the record key from a file name: its final path segment.
pub fn record_key(file_name: &str) -> MediaResult<String> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    if base.is_empty() {
        return Err(MediaError::InvalidFileName(file_name.to_string()));
    }
    ensure_key_safe(base)?;
    Ok(base.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::{
        blob_store::DiskBlobStore, error::StoreKind, metadata_store::SqliteMetadataStore,
    };
    use async_trait::async_trait;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::io;
    use tempfile::TempDir;

    /// Disk blob store and SQLite metadata store rooted in a temp dir.
    pub(crate) struct Fixture {
        pub dir: TempDir,
        pub blobs: Arc<DiskBlobStore>,
        pub metadata: Arc<SqliteMetadataStore>,
    }

    impl Fixture {
        pub async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let blobs = Arc::new(
                DiskBlobStore::new(dir.path().join("blobs"), "pestimage", "http://test")
                    .unwrap(),
            );
            blobs.ensure_container_exists().await.unwrap();

            let options = SqliteConnectOptions::new()
                .filename(dir.path().join("meta.db"))
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .unwrap();
            let metadata =
                Arc::new(SqliteMetadataStore::new(Arc::new(pool), "DeviceTest01").unwrap());
            metadata.ensure_table_exists().await.unwrap();

            Self {
                dir,
                blobs,
                metadata,
            }
        }

        pub fn ingestion(&self) -> IngestionService {
            IngestionService::new(
                self.blobs.clone(),
                self.metadata.clone(),
                "ImageDescription",
            )
        }
    }

    /// Blob store whose writes always fail.
    pub(crate) struct BrokenBlobStore;

    #[async_trait]
    impl BlobStore for BrokenBlobStore {
        async fn ensure_container_exists(&self) -> MediaResult<()> {
            Ok(())
        }
        async fn put(&self, _key: &str, _bytes: Bytes) -> MediaResult<String> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "offline").into())
        }
        async fn get(&self, key: &str) -> MediaResult<Bytes> {
            Err(MediaError::BlobNotFound(key.to_string()))
        }
        fn container(&self) -> &str {
            "pestimage"
        }
        async fn health_check(&self) -> MediaResult<()> {
            Err(MediaError::blob_unavailable("offline"))
        }
    }

    /// Metadata store that cannot be reached.
    pub(crate) struct BrokenMetadataStore;

    #[async_trait]
    impl MetadataStore for BrokenMetadataStore {
        async fn ensure_table_exists(&self) -> MediaResult<()> {
            Err(MediaError::metadata_unavailable("offline"))
        }
        async fn upsert(&self, _record: &MediaRecord) -> MediaResult<()> {
            Err(MediaError::metadata_unavailable("offline"))
        }
        async fn scan_all(&self) -> MediaResult<Vec<MediaRecord>> {
            Err(MediaError::metadata_unavailable("offline"))
        }
        async fn health_check(&self) -> MediaResult<()> {
            Err(MediaError::metadata_unavailable("offline"))
        }
    }

    fn at(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn ingest_writes_blob_then_record() {
        let fx = Fixture::new().await;
        let outcome = fx
            .ingestion()
            .ingest_at(
                Bytes::from_static(b"\x89PNG"),
                "pest1.png",
                "Date: 04/30, 2024\nPest category: Weevil",
                at("2024-04-30T09:12:44.120Z"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.blob_url, "http://test/blobs/pestimage/pest1.png");
        assert_eq!(outcome.record.blob_url, outcome.blob_url);
        assert_eq!(outcome.record.key, "pest1.png");
        assert_eq!(outcome.record.file_name, "pest1.png");
        assert_eq!(outcome.record.partition, "ImageDescription");
        assert_eq!(
            outcome.record.timestamp.as_deref(),
            Some("2024-04-30T09:12:44.120000Z")
        );

        let stored = fx.blobs.get("pest1.png").await.unwrap();
        assert_eq!(&stored[..], b"\x89PNG");
        assert_eq!(fx.metadata.scan_all().await.unwrap(), vec![outcome.record]);
    }

    #[tokio::test]
    async fn reingesting_same_name_overwrites() {
        let fx = Fixture::new().await;
        let service = fx.ingestion();
        service
            .ingest(Bytes::from_static(b"one"), "pest1.png", "first")
            .await
            .unwrap();
        service
            .ingest(Bytes::from_static(b"two"), "pest1.png", "second")
            .await
            .unwrap();

        let rows = fx.metadata.scan_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "pest1.png");
        assert_eq!(rows[0].description, "second");
        assert_eq!(&fx.blobs.get("pest1.png").await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn key_is_the_final_path_segment() {
        let fx = Fixture::new().await;
        let outcome = fx
            .ingestion()
            .ingest(Bytes::from_static(b"x"), "/Users/me/Desktop/image 154.png", "")
            .await
            .unwrap();
        assert_eq!(outcome.record.key, "image 154.png");
        assert_eq!(
            outcome.blob_url,
            "http://test/blobs/pestimage/image%20154.png"
        );
    }

    #[tokio::test]
    async fn invalid_file_name_writes_nothing() {
        let fx = Fixture::new().await;
        for bad in ["", "photos/", ".."] {
            let err = fx
                .ingestion()
                .ingest(Bytes::from_static(b"x"), bad, "")
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::InvalidFileName(_)), "{bad:?}");
        }
        assert!(fx.metadata.scan_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blob_failure_leaves_no_record() {
        let fx = Fixture::new().await;
        let service = IngestionService::new(
            Arc::new(BrokenBlobStore),
            fx.metadata.clone(),
            "ImageDescription",
        );

        let err = service
            .ingest(Bytes::from_static(b"x"), "pest1.png", "Date: 04/30, 2024")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::StorageUnavailable {
                store: StoreKind::Blob,
                ..
            }
        ));
        assert!(fx.metadata.scan_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_failure_keeps_blob_and_reports() {
        let fx = Fixture::new().await;
        let service = IngestionService::new(
            fx.blobs.clone(),
            Arc::new(BrokenMetadataStore),
            "ImageDescription",
        );

        let err = service
            .ingest(Bytes::from_static(b"x"), "pest1.png", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::StorageUnavailable {
                store: StoreKind::Metadata,
                ..
            }
        ));
        assert!(fx.blobs.get("pest1.png").await.is_ok());
    }
}
