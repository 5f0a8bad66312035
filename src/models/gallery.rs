//! What a viewer needs to render query results: an image locator and a caption
//! per record, plus an explicit message when a day has nothing to show.

use crate::{
    models::media_record::MediaRecord,
    services::date_extractor::{self, DateSource},
};
use chrono::NaiveDate;
use serde::Serialize;

pub const NO_RESULTS_MESSAGE: &str = "No images found for this date.";

/// One rendered image.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GalleryEntry {
    pub image_url: String,
    pub caption: String,
    pub file_name: String,
    pub description: String,
    /// The resolved date, `None` when the record carries no usable date.
    pub date: Option<NaiveDate>,
}

impl GalleryEntry {
    /// Caption is `"{file_name} - {description}"`, followed by ` - {when}` when
    /// a date can be resolved. `when` is the full stored timestamp if it parses,
    /// else the description date.
    pub fn from_record(record: &MediaRecord) -> Self {
        let source = date_extractor::resolve(record);
        let when = match source {
            DateSource::FromTimestamp(_) => record
                .timestamp
                .as_deref()
                .and_then(|raw| date_extractor::parse_timestamp(raw).ok())
                .map(|instant| instant.format("%Y-%m-%d %H:%M:%S").to_string()),
            DateSource::FromLegacyText(date) => Some(date.format("%Y-%m-%d").to_string()),
            DateSource::Unparsable => None,
        };

        let mut caption = format!("{} - {}", record.file_name, record.description);
        if let Some(when) = when {
            caption.push_str(" - ");
            caption.push_str(&when);
        }

        Self {
            image_url: record.blob_url.clone(),
            caption,
            file_name: record.file_name.clone(),
            description: record.description.clone(),
            date: source.date(),
        }
    }
}

/// Response body for a gallery request.
#[derive(Serialize, Debug)]
pub struct GalleryPage {
    /// The requested day; absent for an unfiltered listing.
    pub date: Option<NaiveDate>,
    pub count: usize,
    pub entries: Vec<GalleryEntry>,
    /// Set when a dated request has no entries, so viewers never render
    /// nothing silently.
    pub message: Option<String>,
}

impl GalleryPage {
    pub fn new(date: Option<NaiveDate>, records: &[MediaRecord]) -> Self {
        let entries: Vec<GalleryEntry> = records.iter().map(GalleryEntry::from_record).collect();
        let message =
            (date.is_some() && entries.is_empty()).then(|| NO_RESULTS_MESSAGE.to_string());
        Self {
            date,
            count: entries.len(),
            entries,
            message,
        }
    }
}
