//! CDX listing parsing.
//!
//! Two listing shapes are recognized:
//!
//! - JSON (`output=json`): an array of string arrays whose first row names
//!   the columns
//! - plain text: whitespace-separated rows in the default CDX column order
//!   `urlkey timestamp original mimetype statuscode digest length`
//!
//! Bad rows are repaired or dropped one at a time. Only a listing whose
//! overall structure is unrecognizable is an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument, trace};
use url::Url;

use super::error::ListingError;
use super::record::SnapshotRecord;
use crate::config::TIMESTAMP_DIGITS;

/// Matches an explicit `scheme://` prefix.
#[allow(clippy::expect_used)]
static SCHEME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("scheme regex is valid") // Static pattern, safe to panic
});

/// Column positions in the default plain-text CDX output.
const TEXT_TIMESTAMP_COLUMN: usize = 1;
const TEXT_ORIGINAL_COLUMN: usize = 2;
const TEXT_MIMETYPE_COLUMN: usize = 3;
const TEXT_STATUS_COLUMN: usize = 4;

/// Repairs (or rejects) the `original` URL of one listing row.
///
/// The archive occasionally lists URLs that break downstream URL
/// construction. Implementations return `None` to drop the row.
pub trait RowSanitizer {
    /// Returns the usable form of `raw`, or `None` if it cannot be used.
    fn sanitize_url(&self, raw: &str) -> Option<String>;
}

/// Default sanitizer for URLs seen in real listings.
///
/// - strips control characters (stray `\r`, `\t`, NUL) and outer whitespace
/// - prefixes `http://` when the scheme is missing (`example.com/a`)
/// - completes scheme-relative URLs (`//example.com/a`)
/// - rejects anything that still does not parse with a host
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairingSanitizer;

impl RowSanitizer for RepairingSanitizer {
    fn sanitize_url(&self, raw: &str) -> Option<String> {
        let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }

        let repaired = if cleaned.starts_with("//") {
            format!("http:{cleaned}")
        } else if SCHEME_PATTERN.is_match(cleaned) {
            cleaned.to_string()
        } else {
            format!("http://{cleaned}")
        };

        let parsed = Url::parse(&repaired).ok()?;
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Some(repaired),
            _ => None,
        }
    }
}

/// Parses CDX listings into [`SnapshotRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct SnapshotListParser<S = RepairingSanitizer> {
    sanitizer: S,
}

impl<S: RowSanitizer> SnapshotListParser<S> {
    /// Creates a parser with a custom row sanitizer.
    pub fn with_sanitizer(sanitizer: S) -> Self {
        Self { sanitizer }
    }

    /// Parses a raw listing.
    ///
    /// Returns records in listing order. An empty body or an empty JSON array
    /// yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::Malformed`] when the listing is not a CDX
    /// table (invalid JSON, no header, missing required columns, or text
    /// with no row of the expected shape).
    #[instrument(skip(self, raw), fields(raw_len = raw.len()))]
    pub fn parse(&self, raw: &str) -> Result<Vec<SnapshotRecord>, ListingError> {
        let body = raw.trim_start_matches('\u{feff}').trim();
        if body.is_empty() {
            debug!("empty listing");
            return Ok(Vec::new());
        }

        let parsed = if body.starts_with('[') {
            self.parse_json(body)?
        } else {
            self.parse_text(body)?
        };

        info!(
            records = parsed.records.len(),
            dropped = parsed.dropped,
            "parsed snapshot listing"
        );
        Ok(parsed.records)
    }

    fn parse_json(&self, body: &str) -> Result<ParsedRows, ListingError> {
        let rows: Vec<Vec<Cell>> = serde_json::from_str(body)
            .map_err(|e| ListingError::malformed(format!("expected a JSON array of rows: {e}")))?;

        let mut rows = rows.into_iter();
        let Some(header) = rows.next() else {
            return Ok(ParsedRows::default());
        };
        let header: Vec<String> = header.into_iter().map(Cell::into_text).collect();
        let column = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));

        let timestamp_col = column("timestamp")
            .ok_or_else(|| ListingError::malformed("header has no 'timestamp' column"))?;
        let original_col = column("original")
            .ok_or_else(|| ListingError::malformed("header has no 'original' column"))?;
        let mimetype_col = column("mimetype");
        let status_col = column("statuscode");

        let mut parsed = ParsedRows::default();
        for row in rows {
            let cells: Vec<String> = row.into_iter().map(Cell::into_text).collect();
            let field = |index: usize| cells.get(index).map(String::as_str);
            let record = self.build_record(
                field(timestamp_col),
                field(original_col),
                mimetype_col.and_then(field),
                status_col.and_then(field),
            );
            parsed.push(record);
        }
        Ok(parsed)
    }

    fn parse_text(&self, body: &str) -> Result<ParsedRows, ListingError> {
        let mut parsed = ParsedRows::default();
        let mut row_shaped = 0usize;

        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let timestamp = fields.get(TEXT_TIMESTAMP_COLUMN).copied();
            if timestamp.is_some_and(is_valid_timestamp) && fields.len() > TEXT_ORIGINAL_COLUMN {
                row_shaped += 1;
            }
            let record = self.build_record(
                timestamp,
                fields.get(TEXT_ORIGINAL_COLUMN).copied(),
                fields.get(TEXT_MIMETYPE_COLUMN).copied(),
                fields.get(TEXT_STATUS_COLUMN).copied(),
            );
            parsed.push(record);
        }

        if row_shaped == 0 {
            return Err(ListingError::malformed(
                "no line matches the CDX 'urlkey timestamp original ...' layout",
            ));
        }
        Ok(parsed)
    }

    fn build_record(
        &self,
        timestamp: Option<&str>,
        original: Option<&str>,
        mimetype: Option<&str>,
        status_code: Option<&str>,
    ) -> Option<SnapshotRecord> {
        let timestamp = timestamp.map(str::trim).filter(|t| is_valid_timestamp(t))?;
        let Some(original_url) = original.and_then(|raw| self.sanitizer.sanitize_url(raw)) else {
            trace!(timestamp, original = ?original, "dropping row with unusable URL");
            return None;
        };
        Some(SnapshotRecord {
            timestamp: timestamp.to_string(),
            original_url,
            mimetype: informational(mimetype),
            status_code: informational(status_code),
        })
    }
}

/// Parses a raw listing with the default [`RepairingSanitizer`].
///
/// # Errors
///
/// See [`SnapshotListParser::parse`].
pub fn parse_listing(raw: &str) -> Result<Vec<SnapshotRecord>, ListingError> {
    SnapshotListParser::<RepairingSanitizer>::default().parse(raw)
}

/// A JSON listing cell. The archive emits strings, but numbers and nulls have
/// been seen in hand-edited caches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Other(serde_json::Value),
}

impl Cell {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Other(serde_json::Value::Null) => String::new(),
            Self::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct ParsedRows {
    records: Vec<SnapshotRecord>,
    dropped: usize,
}

impl ParsedRows {
    fn push(&mut self, record: Option<SnapshotRecord>) {
        match record {
            Some(record) => self.records.push(record),
            None => self.dropped += 1,
        }
    }
}

fn is_valid_timestamp(value: &str) -> bool {
    !value.is_empty() && value.len() <= TIMESTAMP_DIGITS && value.bytes().all(|b| b.is_ascii_digit())
}

/// CDX uses `-` for "no value".
fn informational(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "-")
        .map(ToString::to_string)
}
