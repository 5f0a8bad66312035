//! Storage adapters and the ingestion/query services built on them.

pub mod blob_store;
pub mod date_extractor;
pub mod error;
pub mod ingestion_service;
pub mod metadata_store;
pub mod query_service;
