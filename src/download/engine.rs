//! Snapshot download engine.
//!
//! This module provides [`fetch_with_retry`], the single fetch primitive used
//! for both the listing and every capture, and the [`DownloadEngine`] which
//! turns one [`SnapshotRecord`] into one [`DownloadOutcome`].
//!
//! # Per-item flow
//!
//! 1. Skip when the natural or hashed path already exists
//! 2. Fetch `<content_base>/<timestamp>id_/<url>` with retry
//! 3. Skip zero-length bodies
//! 4. Write to the natural path; on failure clean up and write once to the
//!    hashed fallback
//!
//! Failures from step 2 or a failed fallback write are handed to the
//! [`FailurePolicy`], which either aborts the run or records the item as
//! failed.
//!
//! # Example
//!
//! ```no_run
//! use waybackdl_core::download::{DownloadEngine, HttpClient};
//! use waybackdl_core::{RunConfig, SnapshotRecord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new("example.com", "./example.com")?;
//! let client = HttpClient::try_new(config.timeout)?;
//! let engine = DownloadEngine::from_config(&config, client);
//! let record = SnapshotRecord::new("20200101000000", "http://example.com/");
//! let outcome = engine.download(&record).await?;
//! println!("{}", outcome.status_label());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::error::{DownloadExhaustedError, EngineError};
use super::path::{LocalPath, PathResolver};
use super::persistence::{remove_empty_dirs, write_atomic};
use super::retry::{AttemptEvent, AttemptState, FailurePolicy, RetryPolicy};
use super::HttpClient;
use crate::config::{ArchiveEndpoints, RunConfig};
use crate::snapshot::SnapshotRecord;

/// Result of handling one snapshot.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The body was written.
    Success {
        /// Where it was written.
        path: PathBuf,
        /// Whether the hashed fallback was used.
        used_fallback: bool,
    },
    /// Dropped by the date range or latest-only reduction.
    SkippedByFilter,
    /// Dropped because its timestamp was explicitly excluded.
    SkippedByUser,
    /// A copy from an earlier run is present.
    AlreadyOnDisk {
        /// The existing file.
        path: PathBuf,
    },
    /// The archive returned an empty body; nothing was written.
    EmptyBody,
    /// Unrecoverable, recorded because `no_fail` is set.
    Failed {
        /// What went wrong.
        error: EngineError,
    },
}

impl DownloadOutcome {
    /// Bracketed status shown at the end of a progress line.
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Success {
                used_fallback: false,
                ..
            } => "[OK]",
            Self::Success {
                used_fallback: true,
                ..
            } => "[OK: saved under hashed name]",
            Self::SkippedByFilter => "[SKIP: filtered out]",
            Self::SkippedByUser => "[SKIP: by timestamp command line option]",
            Self::AlreadyOnDisk { .. } => "[SKIP: already on disk]",
            Self::EmptyBody => "[SKIP: file size is 0]",
            Self::Failed { .. } => "[Failed to download, proceeding to next file]",
        }
    }

    /// Whether a file was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the item was recorded as failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Fetches `url`, retrying per `policy`.
///
/// Every attempt is preceded by the policy's delay. Transport errors and
/// non-2xx statuses count as failed attempts.
///
/// # Errors
///
/// Returns [`DownloadExhaustedError`] with the last attempt's error once the
/// policy allows no further attempts.
#[instrument(skip(client, policy), fields(max_attempts = policy.max_attempts()))]
pub async fn fetch_with_retry(
    client: &HttpClient,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, DownloadExhaustedError> {
    let mut state = policy.transition(AttemptState::Pending, AttemptEvent::Start);

    loop {
        if !policy.delay().is_zero() {
            tokio::time::sleep(policy.delay()).await;
        }
        debug!(attempt = state.attempts(), "attempting fetch");

        match client.get_bytes(url).await {
            Ok(body) => {
                let done = policy.transition(state, AttemptEvent::Succeeded);
                debug!(attempts = done.attempts(), bytes = body.len(), "fetch succeeded");
                return Ok(body);
            }
            Err(error) => match policy.transition(state, AttemptEvent::Failed) {
                AttemptState::Attempting(next) => {
                    info!(
                        url,
                        attempt = next,
                        max_attempts = policy.max_attempts(),
                        delay_ms = policy.delay().as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    state = AttemptState::Attempting(next);
                }
                exhausted => {
                    warn!(
                        url,
                        attempts = exhausted.attempts(),
                        error = %error,
                        "fetch retries exhausted"
                    );
                    return Err(DownloadExhaustedError::new(url, exhausted.attempts(), error));
                }
            },
        }
    }
}

/// Downloads captures one at a time into the output directory.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    endpoints: ArchiveEndpoints,
    output_dir: PathBuf,
    resolver: PathResolver,
    retry_policy: RetryPolicy,
    failure_policy: FailurePolicy,
}

impl DownloadEngine {
    /// Creates an engine from explicit parts.
    #[must_use]
    pub fn new(
        client: HttpClient,
        endpoints: ArchiveEndpoints,
        output_dir: impl Into<PathBuf>,
        resolver: PathResolver,
        retry_policy: RetryPolicy,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            client,
            endpoints,
            output_dir: output_dir.into(),
            resolver,
            retry_policy,
            failure_policy,
        }
    }

    /// Creates an engine configured for one run.
    #[must_use]
    pub fn from_config(config: &RunConfig, client: HttpClient) -> Self {
        Self::new(
            client,
            config.endpoints.clone(),
            config.output_dir.clone(),
            PathResolver::new(config.platform),
            config.retry_policy(),
            config.failure_policy(),
        )
    }

    /// Root of the local mirror.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where `record` would be written.
    #[must_use]
    pub fn planned_path(&self, record: &SnapshotRecord) -> LocalPath {
        self.resolver
            .resolve(&record.original_url, &record.timestamp)
    }

    /// An existing copy of `record` at its natural or hashed path.
    pub async fn existing_copy(&self, record: &SnapshotRecord) -> Option<PathBuf> {
        let natural = self
            .resolver
            .natural_path(&record.original_url, &record.timestamp)
            .ok()
            .map(|path| path.under(&self.output_dir));
        let hashed = self
            .resolver
            .fallback_path(&record.original_url, &record.timestamp)
            .under(&self.output_dir);

        for candidate in natural.into_iter().chain(std::iter::once(hashed)) {
            if tokio::fs::metadata(&candidate)
                .await
                .is_ok_and(|meta| meta.is_file())
            {
                return Some(candidate);
            }
        }
        None
    }

    /// Downloads one capture.
    ///
    /// # Errors
    ///
    /// Without `no_fail`, returns [`EngineError::Exhausted`] when every
    /// attempt failed and [`EngineError::Unwritable`] when neither path
    /// could be written. With `no_fail` these become
    /// [`DownloadOutcome::Failed`].
    #[instrument(skip(self, record), fields(timestamp = %record.timestamp, url = %record.original_url))]
    pub async fn download(&self, record: &SnapshotRecord) -> Result<DownloadOutcome, EngineError> {
        if let Some(path) = self.existing_copy(record).await {
            debug!(path = %path.display(), "already on disk");
            return Ok(DownloadOutcome::AlreadyOnDisk { path });
        }

        let content_url = self
            .endpoints
            .content_url(&record.timestamp, &record.original_url);
        let body = match fetch_with_retry(&self.client, &content_url, &self.retry_policy).await {
            Ok(body) => body,
            Err(exhausted) => return self.failure_policy.resolve(exhausted.into()),
        };

        if body.is_empty() {
            debug!("empty body, nothing to write");
            return Ok(DownloadOutcome::EmptyBody);
        }

        self.persist(record, &body).await
    }

    async fn persist(
        &self,
        record: &SnapshotRecord,
        body: &[u8],
    ) -> Result<DownloadOutcome, EngineError> {
        match self
            .resolver
            .natural_path(&record.original_url, &record.timestamp)
        {
            Ok(natural) => {
                let target = natural.under(&self.output_dir);
                match write_atomic(&target, body).await {
                    Ok(()) => {
                        return Ok(DownloadOutcome::Success {
                            path: target,
                            used_fallback: false,
                        });
                    }
                    Err(error) => {
                        warn!(
                            path = %target.display(),
                            error = %error,
                            "natural path not writable, using hashed fallback"
                        );
                        if let Some(parent) = target.parent() {
                            remove_empty_dirs(parent, &self.output_dir).await;
                        }
                    }
                }
            }
            Err(rejection) => {
                debug!(%rejection, "natural path rejected, using hashed fallback");
            }
        }

        let fallback = self
            .resolver
            .fallback_path(&record.original_url, &record.timestamp)
            .under(&self.output_dir);
        match write_atomic(&fallback, body).await {
            Ok(()) => Ok(DownloadOutcome::Success {
                path: fallback,
                used_fallback: true,
            }),
            Err(error) => self
                .failure_policy
                .resolve(EngineError::unwritable(&record.original_url, error)),
        }
    }
}
