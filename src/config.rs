//! Run configuration consumed by the core pipeline.
//!
//! The CLI (and the optional config file) are external collaborators: they
//! produce a single [`RunConfig`] value, and nothing in the core parses
//! command-line input on its own.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::download::{FailurePolicy, Platform, RetryPolicy};
use crate::snapshot::SnapshotFilter;

/// Default CDX index endpoint of the Wayback Machine.
pub const DEFAULT_CDX_URL: &str = "http://web.archive.org/cdx/search/cdx";

/// Default base URL for raw capture content (`<base>/<timestamp>id_/<url>`).
pub const DEFAULT_CONTENT_BASE_URL: &str = "http://web.archive.org/web";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default courtesy delay before each request, in seconds.
pub const DEFAULT_DELAY_SECS: u64 = 1;

/// Maximum number of digits in a CDX timestamp (`yyyyMMddhhmmss`).
pub const TIMESTAMP_DIGITS: usize = 14;

/// Errors raised while assembling a [`RunConfig`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No domain was given (or it was only a scheme / slashes).
    #[error("domain must not be empty")]
    EmptyDomain,

    /// A `--from`/`--to` bound is not a timestamp prefix.
    #[error("invalid timestamp bound '{value}': {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// `from` is later than `to`, so nothing could ever match.
    #[error("--from ({from}) is later than --to ({to})")]
    InvertedRange {
        /// Lower bound as given.
        from: String,
        /// Upper bound as given.
        to: String,
    },

    /// An archive endpoint URL does not parse.
    #[error("invalid archive endpoint '{url}'")]
    InvalidEndpoint {
        /// The rejected endpoint.
        url: String,
    },
}

/// A `yyyyMMddhhmmss` prefix used as a date-range bound.
///
/// Bounds are prefix-matched: `"2020"` as a lower bound means
/// `20200000000000`, as an upper bound it means `20209999999999`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampBound(String);

impl TimestampBound {
    /// Parses a bound of 1 to 14 ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimestamp`] for empty, over-long or
    /// non-numeric input.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidTimestamp {
                value: raw.to_string(),
                reason: "empty",
            });
        }
        if value.len() > TIMESTAMP_DIGITS {
            return Err(ConfigError::InvalidTimestamp {
                value: raw.to_string(),
                reason: "longer than 14 digits",
            });
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidTimestamp {
                value: raw.to_string(),
                reason: "expected digits only (yyyyMMddhhmmss)",
            });
        }
        Ok(Self(value.to_string()))
    }

    /// The bound as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fourteen-digit key for use as an inclusive lower bound.
    #[must_use]
    pub fn lower_key(&self) -> String {
        pad_timestamp(&self.0, '0')
    }

    /// Fourteen-digit key for use as an inclusive upper bound.
    #[must_use]
    pub fn upper_key(&self) -> String {
        pad_timestamp(&self.0, '9')
    }
}

/// Right-pads (or truncates) a timestamp to 14 characters.
#[must_use]
pub fn pad_timestamp(timestamp: &str, fill: char) -> String {
    let mut key: String = timestamp.chars().take(TIMESTAMP_DIGITS).collect();
    while key.len() < TIMESTAMP_DIGITS {
        key.push(fill);
    }
    key
}

/// Archive service endpoints.
///
/// Overridable so tests (and alternative archive instances) can point the
/// pipeline at a different host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEndpoints {
    /// CDX listing endpoint.
    pub cdx_url: String,
    /// Base URL for raw capture content.
    pub content_base_url: String,
}

impl Default for ArchiveEndpoints {
    fn default() -> Self {
        Self {
            cdx_url: DEFAULT_CDX_URL.to_string(),
            content_base_url: DEFAULT_CONTENT_BASE_URL.to_string(),
        }
    }
}

impl ArchiveEndpoints {
    /// Builds the bulk-listing URL for a domain.
    ///
    /// Always requests the full record set (no collapsing, all metadata
    /// columns) so a cached listing is never a partial view.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the CDX URL does not parse.
    pub fn listing_url(&self, domain: &str) -> Result<Url, ConfigError> {
        Url::parse_with_params(
            &self.cdx_url,
            &[
                ("output", "json"),
                ("url", domain),
                ("matchType", "host"),
                ("filter", "statuscode:200"),
                ("fl", "timestamp,original,mimetype,statuscode"),
            ],
        )
        .map_err(|_| ConfigError::InvalidEndpoint {
            url: self.cdx_url.clone(),
        })
    }

    /// Builds the raw-content URL for one capture.
    ///
    /// The `id_` flag asks the archive for the original bytes without its
    /// replay toolbar or link rewriting.
    #[must_use]
    pub fn content_url(&self, timestamp: &str, original_url: &str) -> String {
        format!(
            "{}/{timestamp}id_/{original_url}",
            self.content_base_url.trim_end_matches('/')
        )
    }
}

/// Everything the pipeline needs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Domain whose captures are mirrored.
    pub domain: String,
    /// Root of the local mirror.
    pub output_dir: PathBuf,
    /// Inclusive lower timestamp bound.
    pub from: Option<TimestampBound>,
    /// Inclusive upper timestamp bound.
    pub to: Option<TimestampBound>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Plan only: no downloads, no files.
    pub dry_run: bool,
    /// Courtesy delay before every request.
    pub delay: Duration,
    /// Additional attempts after the first failed one.
    pub retries: u32,
    /// Record exhausted downloads as failures instead of aborting.
    pub no_fail: bool,
    /// Exact timestamps to leave out.
    pub skip_timestamps: HashSet<String>,
    /// Keep only the newest capture of each URL.
    pub latest_only: bool,
    /// Ignore a cached listing and fetch it again.
    pub refresh_listing: bool,
    /// Archive endpoints.
    pub endpoints: ArchiveEndpoints,
    /// Filesystem rules used for local path validation.
    pub platform: Platform,
}

impl RunConfig {
    /// Creates a configuration with defaults for everything but domain and
    /// output directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyDomain`] if the domain is blank.
    pub fn new(domain: &str, output_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            domain: normalize_domain(domain)?,
            output_dir: output_dir.into(),
            from: None,
            to: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dry_run: false,
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            retries: crate::download::DEFAULT_MAX_RETRIES,
            no_fail: false,
            skip_timestamps: HashSet::new(),
            latest_only: false,
            refresh_listing: false,
            endpoints: ArchiveEndpoints::default(),
            platform: Platform::current(),
        })
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvertedRange`] when `from` sorts after `to`,
    /// or [`ConfigError::InvalidEndpoint`] when an endpoint does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(from), Some(to)) = (&self.from, &self.to)
            && from.lower_key() > to.upper_key()
        {
            return Err(ConfigError::InvertedRange {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.endpoints.listing_url(&self.domain)?;
        Url::parse(&self.endpoints.content_base_url).map_err(|_| {
            ConfigError::InvalidEndpoint {
                url: self.endpoints.content_base_url.clone(),
            }
        })?;
        Ok(())
    }

    /// Filter built from the range, exclusion and latest-only options.
    #[must_use]
    pub fn snapshot_filter(&self) -> SnapshotFilter {
        SnapshotFilter::new()
            .with_from(self.from.clone())
            .with_to(self.to.clone())
            .with_excluded(self.skip_timestamps.iter().cloned())
            .with_latest_only(self.latest_only)
    }

    /// Retry policy shared by listing and content fetches.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.delay)
    }

    /// What to do once retries are exhausted.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::new(self.no_fail)
    }
}

/// Strips a scheme and surrounding slashes so `https://example.com/` and
/// `example.com` query the same host.
fn normalize_domain(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let domain = without_scheme.trim_matches('/');
    if domain.is_empty() {
        return Err(ConfigError::EmptyDomain);
    }
    Ok(domain.to_string())
}
