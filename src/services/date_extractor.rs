//! Resolves the calendar day a media record belongs to.
//!
//! Two signals exist. The ingestion `timestamp` is authoritative; when it is
//! absent or unreadable, a `Date: MM/DD, YYYY` token embedded in the
//! description is used instead. Resolution never fails: a record that carries
//! neither signal resolves to [`DateSource::Unparsable`] and is simply left out
//! of date-filtered results.

use crate::models::media_record::MediaRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;

/// Naive date-time layouts accepted for the timestamp field, tried in order.
/// `%.f` also matches an absent fractional part.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Fixed layout of the legacy description token. The comma sits between the
/// day of month and the year.
const LEGACY_DATE_FORMAT: &str = "%m/%d, %Y";

/// Why a date signal could not be read. Always absorbed by [`extract`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseFailure {
    #[error("timestamp `{0}` is not an ISO-8601 instant")]
    MalformedTimestamp(String),
    #[error("description carries no `Date: ` marker")]
    MarkerMissing,
    #[error("date token `{0}` does not match MM/DD, YYYY")]
    MalformedLegacyToken(String),
}

/// Where a record's date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    FromTimestamp(NaiveDate),
    FromLegacyText(NaiveDate),
    Unparsable,
}

impl DateSource {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            DateSource::FromTimestamp(date) | DateSource::FromLegacyText(date) => Some(date),
            DateSource::Unparsable => None,
        }
    }
}

/// Walk the fallback chain: timestamp first, then the description token.
pub fn resolve(record: &MediaRecord) -> DateSource {
    if let Some(raw) = record.timestamp.as_deref() {
        match parse_timestamp(raw) {
            Ok(instant) => return DateSource::FromTimestamp(instant.date()),
            Err(err) => debug!(key = %record.key, "falling back to description date: {}", err),
        }
    }

    let legacy = record
        .legacy_date_hint()
        .ok_or(DateParseFailure::MarkerMissing)
        .and_then(parse_legacy_hint);

    match legacy {
        Ok(date) => DateSource::FromLegacyText(date),
        Err(err) => {
            debug!(key = %record.key, "record has no usable date: {}", err);
            DateSource::Unparsable
        }
    }
}

/// The calendar date of a record, or `None` when no signal can be read.
pub fn extract(record: &MediaRecord) -> Option<NaiveDate> {
    resolve(record).date()
}

/// Parse a stored ISO-8601 instant.
///
/// A single trailing `Z` is stripped before naive parsing. Explicit offsets
/// are accepted, but the wall-clock value is kept as stored: no timezone
/// conversion happens here.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DateParseFailure> {
    let naive = raw.strip_suffix('Z').unwrap_or(raw);

    if let Some(instant) = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
    {
        return Ok(instant);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.naive_local());
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DateParseFailure::MalformedTimestamp(raw.to_string()))
}

/// Parse the text that follows a `Date: ` marker.
///
/// The month/day part runs up to the first comma; the year is the run of
/// digits after it. Anything after the year is free text and ignored.
pub fn parse_legacy_hint(hint: &str) -> Result<NaiveDate, DateParseFailure> {
    let malformed = || {
        let first_line = hint.lines().next().unwrap_or_default();
        DateParseFailure::MalformedLegacyToken(first_line.to_string())
    };

    let (month_day, tail) = hint.split_once(',').ok_or_else(malformed)?;
    let tail = tail.trim_start();
    let year_end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    let year = &tail[..year_end];
    if year.is_empty() {
        return Err(malformed());
    }

    let token = format!("{}, {}", month_day.trim(), year);
    NaiveDate::parse_from_str(&token, LEGACY_DATE_FORMAT).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(description: &str, timestamp: Option<&str>) -> MediaRecord {
        MediaRecord {
            partition: "ImageDescription".into(),
            key: "pest1.png".into(),
            description: description.into(),
            blob_url: "http://localhost:3000/blobs/pestimage/pest1.png".into(),
            file_name: "pest1.png".into(),
            timestamp: timestamp.map(str::to_string),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timestamp_parses_with_and_without_zulu_suffix() {
        for raw in [
            "2024-05-01T10:00:00Z",
            "2024-05-01T10:00:00",
            "2024-05-01T23:59:59.123456Z",
            "2024-05-01 08:15:00",
            "2024-05-01T10:00",
            "2024-05-01",
        ] {
            assert_eq!(
                parse_timestamp(raw).map(|t| t.date()),
                Ok(ymd(2024, 5, 1)),
                "{raw}"
            );
        }
    }

    #[test]
    fn timestamp_with_offset_keeps_stored_wall_clock() {
        let instant = parse_timestamp("2024-05-01T23:30:00-05:00").unwrap();
        assert_eq!(instant.date(), ymd(2024, 5, 1));
    }

    #[test]
    fn malformed_timestamp_is_reported() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(DateParseFailure::MalformedTimestamp(_))
        ));
        assert!(parse_timestamp("2024-13-01T00:00:00Z").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn legacy_token_ignores_trailing_text() {
        let cases = [
            "04/30, 2024",
            "04/30, 2024\nPest category: Weevil\nNumber: 3",
            "04/30, 2024 Pest control needed",
            " 04/30 ,2024, more, commas",
            "4/30, 2024",
        ];
        for hint in cases {
            assert_eq!(parse_legacy_hint(hint), Ok(ymd(2024, 4, 30)), "{hint:?}");
        }
    }

    #[test]
    fn short_year_is_taken_literally() {
        assert_eq!(parse_legacy_hint("04/30, 24"), Ok(ymd(24, 4, 30)));
        let rec = record("Date: 04/30, 24", None);
        assert_eq!(extract(&rec), Some(ymd(24, 4, 30)));
        assert_ne!(extract(&rec), Some(ymd(2024, 4, 30)));
    }

    #[test]
    fn legacy_token_rejects_bad_values() {
        let cases = [
            "13/40, 2024",
            "04/31, 2024",
            "04/30 2024",
            "04/30, ",
            "tomorrow, 2024",
            "",
        ];
        for hint in cases {
            assert!(
                matches!(
                    parse_legacy_hint(hint),
                    Err(DateParseFailure::MalformedLegacyToken(_))
                ),
                "{hint:?}"
            );
        }
    }

    #[test]
    fn timestamp_takes_precedence_over_description() {
        let rec = record("Date: 04/30, 2024", Some("2024-05-01T10:00:00Z"));
        assert_eq!(resolve(&rec), DateSource::FromTimestamp(ymd(2024, 5, 1)));
    }

    #[test]
    fn falls_back_to_description_when_timestamp_unusable() {
        let rec = record("Date: 04/30, 2024\nPest category: Weevil", Some("not a time"));
        assert_eq!(resolve(&rec), DateSource::FromLegacyText(ymd(2024, 4, 30)));

        let rec = record("Date: 04/30, 2024", None);
        assert_eq!(extract(&rec), Some(ymd(2024, 4, 30)));
    }

    #[test]
    fn first_marker_wins() {
        let rec = record("Date: 04/30, 2024 retake Date: 05/02, 2024", None);
        assert_eq!(extract(&rec), Some(ymd(2024, 4, 30)));
    }

    #[test]
    fn records_without_any_signal_are_unparsable() {
        assert_eq!(
            resolve(&record("Pest category: Weevil", None)),
            DateSource::Unparsable
        );
        assert_eq!(
            resolve(&record("Date: 13/40, 2024", None)),
            DateSource::Unparsable
        );
        assert_eq!(extract(&record("Date: 04/30", Some("garbage"))), None);
    }
}
