//! Represents one ingested image and the metadata stored alongside it.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Marker that introduces a date token inside a free-text description,
/// e.g. `"Date: 04/30, 2024\nPest category: Weevil"`.
pub const LEGACY_DATE_MARKER: &str = "Date: ";

/// A metadata record in the media collection.
///
/// The image bytes themselves live in the blob store; `blob_url` points at
/// them. Records are keyed by (`partition`, `key`) and written with upsert
/// semantics, so re-ingesting a file name replaces the previous record.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct MediaRecord {
    /// Logical grouping label shared by every record in the collection.
    #[sqlx(rename = "partition_key")]
    pub partition: String,

    /// Unique key within the partition, derived from the file name.
    #[sqlx(rename = "row_key")]
    pub key: String,

    /// Author-supplied description. May embed a `Date: MM/DD, YYYY` token.
    pub description: String,

    /// Fetchable locator of the stored image.
    pub blob_url: String,

    /// Display name of the image.
    pub file_name: String,

    /// ISO-8601 UTC instant recorded at ingestion time, with a trailing `Z`.
    pub timestamp: Option<String>,
}

impl MediaRecord {
    /// The text following the first `Date: ` marker in the description, if any.
    pub fn legacy_date_hint(&self) -> Option<&str> {
        self.description
            .split_once(LEGACY_DATE_MARKER)
            .map(|(_, rest)| rest)
    }
}
