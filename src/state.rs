//! Shared handler state: the two stores and the services wired over them.

use crate::services::{
    blob_store::BlobStore, ingestion_service::IngestionService, metadata_store::MetadataStore,
    query_service::QueryService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: IngestionService,
    pub query: QueryService,
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            ingestion: IngestionService::new(blobs.clone(), metadata.clone(), partition),
            query: QueryService::new(metadata.clone()),
            blobs,
            metadata,
        }
    }
}
