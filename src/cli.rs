//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use waybackdl_core::config::{DEFAULT_DELAY_SECS, DEFAULT_TIMEOUT_SECS, TIMESTAMP_DIGITS};
use waybackdl_core::{ArchiveEndpoints, ConfigError, RunConfig, TimestampBound};

use crate::app_config::{FileConfig, VerbositySetting};

/// Download every archived snapshot of a domain from the Wayback Machine.
///
/// The snapshot listing is cached in the output directory as
/// `snapshots.json`; captures already on disk are skipped, so an
/// interrupted run can simply be started again.
#[derive(Parser, Debug)]
#[command(name = "waybackdl")]
#[command(author, version, about)]
pub struct Args {
    /// Domain to mirror (e.g. example.com)
    #[arg(short, long)]
    pub domain: String,

    /// Output directory [default: ./<domain>]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Earliest capture to fetch, as a yyyyMMddhhmmss prefix (e.g. 2019 or 201906)
    #[arg(long, value_parser = parse_timestamp_bound)]
    pub from: Option<TimestampBound>,

    /// Latest capture to fetch, as a yyyyMMddhhmmss prefix (2020 includes all of 2020)
    #[arg(long, value_parser = parse_timestamp_bound)]
    pub to: Option<TimestampBound>,

    /// Request timeout in seconds [default: 10]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// List what would be downloaded without fetching or writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Delay before every request in seconds [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub delay: Option<u64>,

    /// Retries after a failed request [default: 0]
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub retries: Option<u32>,

    /// Record failed downloads and continue instead of aborting
    #[arg(long)]
    pub no_fail: bool,

    /// Exact capture timestamps to skip
    #[arg(long, num_args = 1.., value_name = "TIMESTAMP", value_parser = parse_exact_timestamp)]
    pub skip_timestamps: Vec<String>,

    /// Only fetch the newest capture of each URL
    #[arg(long)]
    pub latest_only: bool,

    /// Fetch the snapshot listing again even if a cached copy exists
    #[arg(long)]
    pub refresh: bool,

    /// Base URL of the archive service
    #[arg(long, value_name = "URL")]
    pub archive_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Merges arguments over file defaults into a validated [`RunConfig`].
    ///
    /// Command-line values win; boolean flags can only switch an option on.
    pub fn to_run_config(&self, file: &FileConfig) -> Result<RunConfig> {
        let mut config =
            RunConfig::new(&self.domain, PathBuf::new()).context("Invalid --domain")?;
        config.output_dir = match (&self.output, &file.output_dir) {
            (Some(output), _) => output.clone(),
            (None, Some(parent)) => parent.join(&config.domain),
            (None, None) => PathBuf::from(&config.domain),
        };
        config.from.clone_from(&self.from);
        config.to.clone_from(&self.to);
        config.timeout = Duration::from_secs(
            self.timeout
                .or(file.timeout)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        config.delay = Duration::from_secs(self.delay.or(file.delay).unwrap_or(DEFAULT_DELAY_SECS));
        if let Some(retries) = self.retries.or(file.retries) {
            config.retries = retries;
        }
        config.dry_run = self.dry_run;
        config.no_fail = self.no_fail || file.no_fail.unwrap_or(false);
        config.latest_only = self.latest_only || file.latest_only.unwrap_or(false);
        config.refresh_listing = self.refresh;
        config.skip_timestamps = self.skip_timestamps.iter().cloned().collect();
        if let Some(base) = &self.archive_url {
            config.endpoints = archive_endpoints(base);
        }

        config.validate().context("Invalid arguments")?;
        Ok(config)
    }

    /// Default log filter directive; `RUST_LOG` still takes precedence.
    ///
    /// Priority: `--debug` > `-q` > `-v` > config file verbosity > info.
    #[must_use]
    pub fn log_directive(&self, file_verbosity: Option<VerbositySetting>) -> String {
        let level = if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            match (self.verbose, file_verbosity) {
                (0, None | Some(VerbositySetting::Default)) => "info",
                (0, Some(VerbositySetting::Quiet)) => "error",
                (0 | 1, Some(VerbositySetting::Verbose | VerbositySetting::Debug)) | (1, _) => {
                    "debug"
                }
                _ => "trace",
            }
        };
        format!("warn,waybackdl={level},waybackdl_core={level}")
    }
}

/// Endpoints of an archive served from `base`, laid out like the Wayback Machine.
fn archive_endpoints(base: &str) -> ArchiveEndpoints {
    let base = base.trim_end_matches('/');
    ArchiveEndpoints {
        cdx_url: format!("{base}/cdx/search/cdx"),
        content_base_url: format!("{base}/web"),
    }
}

fn parse_timestamp_bound(raw: &str) -> Result<TimestampBound, ConfigError> {
    TimestampBound::parse(raw)
}

fn parse_exact_timestamp(raw: &str) -> Result<String, String> {
    let value = raw.trim();
    if value.is_empty()
        || value.len() > TIMESTAMP_DIGITS
        || !value.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!(
            "'{raw}' is not a capture timestamp (1 to {TIMESTAMP_DIGITS} digits)"
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["waybackdl"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_domain_is_required() {
        let err = Args::try_parse_from(["waybackdl"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_defaults() {
        let config = parse(&["-d", "example.com"])
            .to_run_config(&FileConfig::default())
            .unwrap();
        assert_eq!(config.domain, "example.com");
        assert_eq!(config.output_dir, PathBuf::from("example.com"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.retries, 0);
        assert!(!config.dry_run);
        assert!(!config.no_fail);
        assert!(!config.latest_only);
        assert!(config.skip_timestamps.is_empty());
    }

    #[test]
    fn test_cli_default_output_uses_normalized_domain() {
        let config = parse(&["-d", "https://example.com/"])
            .to_run_config(&FileConfig::default())
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("example.com"));
    }

    #[test]
    fn test_cli_all_flags() {
        let config = parse(&[
            "--domain",
            "example.com",
            "-o",
            "/tmp/mirror",
            "--from",
            "2019",
            "--to",
            "2020",
            "--timeout",
            "30",
            "-n",
            "--delay",
            "0",
            "--retries",
            "3",
            "--no-fail",
            "--latest-only",
            "--refresh",
        ])
        .to_run_config(&FileConfig::default())
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/mirror"));
        assert_eq!(config.from.unwrap().as_str(), "2019");
        assert_eq!(config.to.unwrap().as_str(), "2020");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.dry_run);
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.retries, 3);
        assert!(config.no_fail);
        assert!(config.latest_only);
        assert!(config.refresh_listing);
    }

    #[test]
    fn test_cli_skip_timestamps_repeatable() {
        let args = parse(&[
            "-d",
            "example.com",
            "--skip-timestamps",
            "20200101000000",
            "2021",
            "--skip-timestamps",
            "20220202",
        ]);
        assert_eq!(args.skip_timestamps, vec!["20200101000000", "2021", "20220202"]);
    }

    #[test]
    fn test_cli_rejects_bad_timestamps() {
        let err = Args::try_parse_from(["waybackdl", "-d", "x.com", "--from", "2020-01"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = Args::try_parse_from(["waybackdl", "-d", "x.com", "--skip-timestamps", "abc"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_range_validation() {
        let err =
            Args::try_parse_from(["waybackdl", "-d", "x.com", "--timeout", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err =
            Args::try_parse_from(["waybackdl", "-d", "x.com", "--retries", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_inverted_range_rejected_at_merge() {
        let err = parse(&["-d", "x.com", "--from", "2021", "--to", "2020"])
            .to_run_config(&FileConfig::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("later than"));
    }

    #[test]
    fn test_file_config_supplies_defaults() {
        let file = FileConfig {
            output_dir: Some(PathBuf::from("/srv/mirrors")),
            timeout: Some(60),
            delay: Some(3),
            retries: Some(2),
            no_fail: Some(true),
            latest_only: Some(true),
            verbosity: None,
        };
        let config = parse(&["-d", "example.com"]).to_run_config(&file).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/mirrors/example.com"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(config.retries, 2);
        assert!(config.no_fail);
        assert!(config.latest_only);
    }

    #[test]
    fn test_cli_values_override_file_config() {
        let file = FileConfig {
            delay: Some(3),
            retries: Some(2),
            ..FileConfig::default()
        };
        let config = parse(&["-d", "example.com", "--delay", "0", "--retries", "0"])
            .to_run_config(&file)
            .unwrap();
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.retries, 0);
    }

    #[test]
    fn test_archive_url_sets_both_endpoints() {
        let config = parse(&["-d", "example.com", "--archive-url", "http://127.0.0.1:8080/"])
            .to_run_config(&FileConfig::default())
            .unwrap();
        assert_eq!(config.endpoints.cdx_url, "http://127.0.0.1:8080/cdx/search/cdx");
        assert_eq!(config.endpoints.content_base_url, "http://127.0.0.1:8080/web");
    }

    #[test]
    fn test_log_directive_priority() {
        let debug = parse(&["-d", "x.com", "--debug", "-q"]);
        assert!(debug.log_directive(None).contains("waybackdl_core=debug"));

        let quiet = parse(&["-d", "x.com", "-q", "-v"]);
        assert!(quiet.log_directive(None).contains("waybackdl=error"));

        let plain = parse(&["-d", "x.com"]);
        assert!(plain.log_directive(None).contains("waybackdl=info"));
        assert!(
            plain
                .log_directive(Some(VerbositySetting::Quiet))
                .contains("waybackdl=error")
        );

        let very = parse(&["-d", "x.com", "-vv"]);
        assert!(very.log_directive(None).contains("waybackdl=trace"));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["waybackdl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
