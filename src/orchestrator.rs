//! End-to-end mirroring pipeline.
//!
//! load listing (cache or network) → parse → stable sort by timestamp →
//! filter → download each record in order, reporting one progress line per
//! item and an aggregate summary at the end.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{Level, debug, error, info, instrument, trace, warn};

use crate::config::{ConfigError, RunConfig};
use crate::download::{DownloadEngine, DownloadError, DownloadOutcome, EngineError, HttpClient};
use crate::snapshot::{
    FilterStats, FilteredSnapshotSet, ListingError, SkipReason, SnapshotIndexFetcher,
    SnapshotRecord, parse_listing,
};

/// File under the output directory holding the raw listing of the last fetch.
pub const LISTING_CACHE_FILE: &str = "snapshots.json";

/// Receives human-readable progress lines.
///
/// The level tells the sink how prominent the line is; the pipeline never
/// writes to the terminal itself.
pub trait ProgressReporter: Send + Sync {
    /// Handles one progress line.
    fn report(&self, level: Level, line: &str);
}

/// Forwards progress lines to `tracing` at the given level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, level: Level, line: &str) {
        if level == Level::ERROR {
            error!("{line}");
        } else if level == Level::WARN {
            warn!("{line}");
        } else if level == Level::INFO {
            info!("{line}");
        } else if level == Level::DEBUG {
            debug!("{line}");
        } else {
            trace!("{line}");
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Client(DownloadError),

    /// The listing could not be fetched or parsed.
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// The archive holds no captures for the domain.
    #[error("no snapshots archived for {domain}")]
    NoSnapshots {
        /// The queried domain.
        domain: String,
    },

    /// The listing cache could not be read or written.
    #[error("listing cache {path}: {source}")]
    Cache {
        /// Cache file location.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// An item failed and `no_fail` was not set.
    #[error("aborted at ({position}/{total}) {timestamp} {url}: {source}")]
    Aborted {
        /// 1-based position of the failed item.
        position: usize,
        /// Items planned.
        total: usize,
        /// Capture timestamp of the failed item.
        timestamp: String,
        /// Original URL of the failed item.
        url: String,
        /// Why it failed.
        #[source]
        source: EngineError,
    },
}

impl RunError {
    fn cache(path: &Path, source: io::Error) -> Self {
        Self::Cache {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Aggregate counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records left after filtering.
    pub planned: usize,
    /// Files written (natural or fallback path).
    pub succeeded: usize,
    /// Of `succeeded`, those written under the hashed fallback.
    pub used_fallback: usize,
    /// Captures present from an earlier run.
    pub already_on_disk: usize,
    /// Captures with an empty body.
    pub empty: usize,
    /// Records dropped by range or latest-only reduction.
    pub skipped_by_filter: usize,
    /// Records dropped by explicit timestamp exclusion.
    pub skipped_by_user: usize,
    /// Items recorded as failed under `no_fail`.
    pub failed: usize,
}

impl RunSummary {
    /// Counts one item's outcome.
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        self.add(outcome, 1);
    }

    /// Counts `count` items sharing one outcome kind.
    pub fn add(&mut self, outcome: &DownloadOutcome, count: usize) {
        match outcome {
            DownloadOutcome::Success { used_fallback, .. } => {
                self.succeeded += count;
                if *used_fallback {
                    self.used_fallback += count;
                }
            }
            DownloadOutcome::SkippedByFilter => self.skipped_by_filter += count,
            DownloadOutcome::SkippedByUser => self.skipped_by_user += count,
            DownloadOutcome::AlreadyOnDisk { .. } => self.already_on_disk += count,
            DownloadOutcome::EmptyBody => self.empty += count,
            DownloadOutcome::Failed { .. } => self.failed += count,
        }
    }

    /// Everything that was neither written nor failed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.already_on_disk + self.empty + self.skipped_by_filter + self.skipped_by_user
    }

    fn add_filter_stats(&mut self, stats: FilterStats) {
        self.add(&DownloadOutcome::SkippedByFilter, stats.filtered());
        self.add(&DownloadOutcome::SkippedByUser, stats.excluded);
    }
}

/// Runs the pipeline for one [`RunConfig`].
#[derive(Debug)]
pub struct Orchestrator<R = TracingReporter> {
    config: RunConfig,
    client: HttpClient,
    reporter: R,
}

impl<R: ProgressReporter> Orchestrator<R> {
    /// Validates `config` and prepares the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] for an inconsistent configuration and
    /// [`RunError::Client`] if no HTTP client can be built.
    pub fn new(config: RunConfig, reporter: R) -> Result<Self, RunError> {
        config.validate()?;
        let client = HttpClient::try_new(config.timeout).map_err(RunError::Client)?;
        Ok(Self {
            config,
            client,
            reporter,
        })
    }

    /// The configuration this run uses.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The progress sink.
    #[must_use]
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Location of the listing cache.
    #[must_use]
    pub fn listing_cache_path(&self) -> PathBuf {
        self.config.output_dir.join(LISTING_CACHE_FILE)
    }

    /// Parses, orders and filters a raw listing.
    ///
    /// Records are stable-sorted by timestamp before filtering, so the
    /// download order is chronological and ties keep listing order.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Listing`] for a malformed listing and
    /// [`RunError::NoSnapshots`] when it holds no usable rows.
    pub fn plan(&self, raw: &str) -> Result<FilteredSnapshotSet, RunError> {
        let mut records = parse_listing(raw)?;
        if records.is_empty() {
            return Err(RunError::NoSnapshots {
                domain: self.config.domain.clone(),
            });
        }
        records.sort_by_cached_key(SnapshotRecord::timestamp_key);
        Ok(self.config.snapshot_filter().apply(records))
    }

    /// Runs the whole pipeline.
    ///
    /// # Errors
    ///
    /// Listing, cache and configuration problems are fatal. Without
    /// `no_fail`, the first unrecoverable item ends the run with
    /// [`RunError::Aborted`].
    #[instrument(skip(self), fields(domain = %self.config.domain, dry_run = self.config.dry_run))]
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let (raw, fetched) = self.load_listing().await?;
        let plan = self.plan(&raw)?;
        if fetched && !self.config.dry_run {
            self.store_listing(&raw).await?;
        }

        let stats = plan.stats();
        let mut summary = RunSummary {
            planned: plan.len(),
            ..RunSummary::default()
        };
        summary.add_filter_stats(stats);
        info!(
            listed = stats.input,
            out_of_range = stats.out_of_range,
            excluded = stats.excluded,
            superseded = stats.superseded,
            planned = plan.len(),
            "snapshot plan ready"
        );
        self.report_skipped(&plan);

        if plan.is_empty() {
            self.reporter.report(
                Level::WARN,
                &format!(
                    "No snapshots of {} match the requested filters",
                    self.config.domain
                ),
            );
            return Ok(summary);
        }

        let engine = DownloadEngine::from_config(&self.config, self.client.clone());
        if self.config.dry_run {
            self.report_dry_run(&engine, &plan, &mut summary).await;
            return Ok(summary);
        }

        let total = plan.len();
        self.reporter.report(
            Level::INFO,
            &format!("Downloading {total} snapshots of {}", self.config.domain),
        );
        for (index, record) in plan.iter().enumerate() {
            let position = index + 1;
            match engine.download(record).await {
                Ok(outcome) => {
                    let level = if outcome.is_failure() {
                        Level::WARN
                    } else {
                        Level::INFO
                    };
                    self.reporter.report(
                        level,
                        &progress_line(position, total, record, outcome.status_label()),
                    );
                    summary.record(&outcome);
                }
                Err(source) => {
                    let status = abort_label(&source, self.config.retries);
                    self.reporter.report(
                        Level::ERROR,
                        &progress_line(position, total, record, &status),
                    );
                    return Err(RunError::Aborted {
                        position,
                        total,
                        timestamp: record.timestamp.clone(),
                        url: record.original_url.clone(),
                        source,
                    });
                }
            }
        }

        self.reporter.report(
            Level::INFO,
            &format!(
                "Done: {} downloaded, {} skipped, {} failed",
                summary.succeeded,
                summary.skipped(),
                summary.failed
            ),
        );
        Ok(summary)
    }

    /// One line per record the filter left out. Explicit exclusions are
    /// shown at info level, range and latest-only drops at debug.
    fn report_skipped(&self, plan: &FilteredSnapshotSet) {
        for (reason, record) in plan.skipped() {
            let (level, outcome) = match reason {
                SkipReason::Excluded => (Level::INFO, DownloadOutcome::SkippedByUser),
                SkipReason::OutOfRange | SkipReason::Superseded => {
                    (Level::DEBUG, DownloadOutcome::SkippedByFilter)
                }
            };
            self.reporter.report(
                level,
                &format!(
                    "{} {} {}",
                    record.timestamp,
                    record.original_url,
                    outcome.status_label()
                ),
            );
        }
    }

    async fn report_dry_run(
        &self,
        engine: &DownloadEngine,
        plan: &FilteredSnapshotSet,
        summary: &mut RunSummary,
    ) {
        let total = plan.len();
        let mut would_download = 0;
        for (index, record) in plan.iter().enumerate() {
            let status = match engine.existing_copy(record).await {
                Some(path) => {
                    let outcome = DownloadOutcome::AlreadyOnDisk { path };
                    summary.record(&outcome);
                    outcome.status_label()
                }
                None => {
                    would_download += 1;
                    "[DRY RUN]"
                }
            };
            self.reporter
                .report(Level::INFO, &progress_line(index + 1, total, record, status));
        }
        self.reporter.report(
            Level::INFO,
            &format!("Dry run: {would_download} of {total} planned snapshots would be downloaded"),
        );
    }

    /// Reads the cached listing, or fetches it. The flag is `true` when the
    /// listing came from the network.
    async fn load_listing(&self) -> Result<(String, bool), RunError> {
        let cache = self.listing_cache_path();
        if !self.config.refresh_listing
            && tokio::fs::try_exists(&cache)
                .await
                .map_err(|e| RunError::cache(&cache, e))?
        {
            let bytes = tokio::fs::read(&cache)
                .await
                .map_err(|e| RunError::cache(&cache, e))?;
            info!(path = %cache.display(), "using cached snapshot listing");
            return Ok((String::from_utf8_lossy(&bytes).into_owned(), false));
        }

        let fetcher = SnapshotIndexFetcher::new(
            &self.client,
            &self.config.endpoints,
            self.config.retry_policy(),
        );
        let raw = fetcher.fetch(&self.config.domain).await?;
        Ok((raw, true))
    }

    async fn store_listing(&self, raw: &str) -> Result<(), RunError> {
        let cache = self.listing_cache_path();
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| RunError::cache(&cache, e))?;
        tokio::fs::write(&cache, raw.as_bytes())
            .await
            .map_err(|e| RunError::cache(&cache, e))?;
        debug!(path = %cache.display(), "snapshot listing cached");
        Ok(())
    }
}

fn progress_line(position: usize, total: usize, record: &SnapshotRecord, status: &str) -> String {
    format!(
        "({position}/{total}) {} {} {status}",
        record.timestamp, record.original_url
    )
}

fn abort_label(error: &EngineError, retries: u32) -> String {
    match error {
        EngineError::Exhausted(_) if retries > 0 => format!("[{retries} retries failed, aborted]"),
        EngineError::Exhausted(_) => "[Failed to download, aborted]".to_string(),
        EngineError::Unwritable { .. } => "[Failed to save, aborted]".to_string(),
    }
}
