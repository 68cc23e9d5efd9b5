//! Wayback downloader core library.
//!
//! This library retrieves the archived snapshot listing for a domain from the
//! Internet Archive CDX index and re-downloads each capture to local disk,
//! reconstructing a browsable mirror.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`snapshot`] - CDX listing retrieval, parsing and filtering
//! - [`download`] - Fetch-with-retry, local path mapping and persistence
//! - [`orchestrator`] - End-to-end pipeline with progress reporting
//! - [`config`] - The run configuration value object

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod orchestrator;
pub mod snapshot;

mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{ArchiveEndpoints, ConfigError, RunConfig, TimestampBound};
pub use download::{
    AttemptEvent, AttemptState, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadError,
    DownloadExhaustedError, DownloadOutcome, EngineError, FailurePolicy, HttpClient, LocalPath,
    PathRejection, PathResolver, Platform, RetryPolicy, fetch_with_retry,
};
pub use orchestrator::{
    LISTING_CACHE_FILE, Orchestrator, ProgressReporter, RunError, RunSummary, TracingReporter,
};
pub use snapshot::{
    FilterStats, FilteredSnapshotSet, ListingError, SkipReason, SnapshotFilter, SnapshotIndexFetcher,
    SnapshotRecord, parse_listing,
};
