//! Error types for the download module.
//!
//! This module defines structured errors for fetching and persisting
//! snapshots, each carrying the URL or path it concerns.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single fetch attempt or a single write.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while persisting a body.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a client construction error.
    pub fn client(source: reqwest::Error) -> Self {
        Self::Client { source }
    }
}

/// Every attempt allowed by the retry policy failed.
#[derive(Debug, Error)]
#[error("gave up on {url} after {attempts} attempt(s): {last_error}")]
pub struct DownloadExhaustedError {
    /// The URL that could not be fetched.
    pub url: String,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// The error from the final attempt.
    #[source]
    pub last_error: DownloadError,
}

impl DownloadExhaustedError {
    /// Creates an exhaustion error from the final attempt's failure.
    pub fn new(url: impl Into<String>, attempts: u32, last_error: DownloadError) -> Self {
        Self {
            url: url.into(),
            attempts,
            last_error,
        }
    }
}

/// Errors that end a snapshot download without a saved file.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Retries were exhausted while fetching the capture.
    #[error(transparent)]
    Exhausted(#[from] DownloadExhaustedError),

    /// Neither the natural path nor the hashed fallback could be written.
    #[error("could not save {url}: {source}")]
    Unwritable {
        /// Original URL of the capture.
        url: String,
        /// The failed fallback write.
        #[source]
        source: DownloadError,
    },
}

impl EngineError {
    /// Creates an unwritable-destination error.
    pub fn unwritable(url: impl Into<String>, source: DownloadError) -> Self {
        Self::Unwritable {
            url: url.into(),
            source,
        }
    }
}
