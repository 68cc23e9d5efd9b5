//! Error types for listing retrieval and parsing.

use thiserror::Error;

use crate::config::ConfigError;
use crate::download::DownloadExhaustedError;

/// Errors that can occur while obtaining the snapshot listing.
///
/// Individual malformed rows are never reported here; they are repaired or
/// dropped by the parser. These errors are fatal for a run.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing could not be fetched after all attempts.
    #[error("network error fetching snapshot listing: {0}")]
    Network(#[source] DownloadExhaustedError),

    /// The listing's overall shape is not a CDX table.
    #[error("malformed snapshot listing: {reason}")]
    Malformed {
        /// What was wrong with the structure.
        reason: String,
    },

    /// The listing URL could not be built.
    #[error(transparent)]
    Endpoint(#[from] ConfigError),
}

impl ListingError {
    /// Creates a [`ListingError::Malformed`] error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let error = ListingError::malformed("header has no 'original' column");
        let msg = error.to_string();
        assert!(msg.contains("malformed snapshot listing"), "{msg}");
        assert!(msg.contains("original"), "{msg}");
    }
}
