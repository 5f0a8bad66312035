//! QueryService: the one read path: every record whose resolved date is a
//! given calendar day.
//!
//! There is no index. Each query enumerates the whole collection and runs the
//! date extractor over every record.

use crate::{
    models::media_record::MediaRecord,
    services::{
        date_extractor,
        error::{MediaError, MediaResult},
        metadata_store::MetadataStore,
    },
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error};

/// Outcome of a date query. Keeps "nothing that day" apart from "the store
/// could not be read".
#[derive(Debug)]
pub enum DateQueryResult {
    Matched(Vec<MediaRecord>),
    NoMatches,
    Failed(MediaError),
}

impl DateQueryResult {
    /// Matching records; empty for both `NoMatches` and `Failed`.
    pub fn records(&self) -> &[MediaRecord] {
        match self {
            DateQueryResult::Matched(records) => records,
            DateQueryResult::NoMatches | DateQueryResult::Failed(_) => &[],
        }
    }
}

#[derive(Clone)]
pub struct QueryService {
    metadata: Arc<dyn MetadataStore>,
}

impl QueryService {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Records dated exactly `target`, in store enumeration order.
    ///
    /// Never returns an error: enumeration failures are logged and surface as
    /// [`DateQueryResult::Failed`].
    pub async fn find_by_date(&self, target: NaiveDate) -> DateQueryResult {
        let records = match self.metadata.scan_all().await {
            Ok(records) => records,
            Err(err) => {
                error!("failed to enumerate media records for {}: {}", target, err);
                return DateQueryResult::Failed(err);
            }
        };

        let scanned = records.len();
        let matched: Vec<MediaRecord> = records
            .into_iter()
            .filter(|record| date_extractor::extract(record) == Some(target))
            .collect();
        debug!("{} of {} records dated {}", matched.len(), scanned, target);

        if matched.is_empty() {
            DateQueryResult::NoMatches
        } else {
            DateQueryResult::Matched(matched)
        }
    }

    /// The whole collection, unfiltered.
    pub async fn list_all(&self) -> MediaResult<Vec<MediaRecord>> {
        self.metadata.scan_all().await
    }
}
