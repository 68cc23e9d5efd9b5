//! Fetching captures and persisting them under safe local paths.
//!
//! This module provides the fetch-with-retry primitive shared with the
//! listing fetcher, the URL-to-path mapping, and the per-snapshot download
//! engine.
//!
//! # Features
//!
//! - Fixed-delay retry modeled as an explicit state machine
//! - Raw-byte bodies (no charset decoding)
//! - Write-after-receipt persistence via temp file and rename
//! - Deterministic natural paths with a hashed fallback
//! - Skips for captures already on disk and for empty bodies
//!
//! # Example
//!
//! ```
//! use waybackdl_core::download::{PathResolver, Platform};
//!
//! let resolver = PathResolver::new(Platform::Unix);
//! let path = resolver.resolve("http://example.com/docs/", "20200101000000");
//! assert_eq!(
//!     path.relative(),
//!     std::path::Path::new("20200101000000/example.com/docs/index.html")
//! );
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod path;
mod persistence;
mod retry;

pub use client::HttpClient;
pub use constants::FALLBACK_DIR;
pub use engine::{DownloadEngine, DownloadOutcome, fetch_with_retry};
pub use error::{DownloadError, DownloadExhaustedError, EngineError};
pub use path::{LocalPath, PathRejection, PathResolver, Platform};
pub use retry::{AttemptEvent, AttemptState, DEFAULT_MAX_RETRIES, FailurePolicy, RetryPolicy};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
