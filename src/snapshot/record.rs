//! The typed form of one CDX listing row.

use serde::Serialize;

use crate::config::pad_timestamp;

/// One archived capture, identified by `(original_url, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    /// Capture time as 1 to 14 digits of `yyyyMMddhhmmss`.
    pub timestamp: String,
    /// The URL as it was archived, after row sanitizing.
    pub original_url: String,
    /// Reported MIME type (informational).
    pub mimetype: Option<String>,
    /// Reported HTTP status (informational).
    pub status_code: Option<String>,
}

impl SnapshotRecord {
    /// Creates a record without the informational columns.
    pub fn new(timestamp: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            original_url: original_url.into(),
            mimetype: None,
            status_code: None,
        }
    }

    /// Fourteen-digit ordering key.
    ///
    /// Partial timestamps are zero-padded, so lexicographic order of keys is
    /// chronological order of captures.
    #[must_use]
    pub fn timestamp_key(&self) -> String {
        pad_timestamp(&self.timestamp, '0')
    }
}
