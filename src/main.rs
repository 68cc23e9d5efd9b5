//! CLI entry point for the waybackdl tool.

use std::fs::{self, File};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use waybackdl_core::{Orchestrator, RunConfig, TracingReporter};

mod app_config;
mod cli;

use cli::Args;

/// Per-run log written next to the mirror, recreated on every run.
const RUN_LOG_FILE: &str = "waybackdl.log";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = app_config::load_default_file_config()?;
    let file_config = loaded.config.unwrap_or_default();
    let config = args.to_run_config(&file_config)?;

    init_tracing(&args, &file_config, &config)?;

    debug!(?args, "CLI arguments parsed");
    if let Some(path) = loaded.path.as_deref() {
        debug!(path = %path.display(), "config file location");
    }
    info!(
        domain = %config.domain,
        output = %config.output_dir.display(),
        dry_run = config.dry_run,
        "waybackdl starting"
    );

    let orchestrator = Orchestrator::new(config, TracingReporter)?;
    match orchestrator.run().await {
        Ok(summary) => {
            info!(
                planned = summary.planned,
                succeeded = summary.succeeded,
                hashed = summary.used_fallback,
                skipped = summary.skipped(),
                failed = summary.failed,
                "run complete"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("{:#}", anyhow::Error::from(err));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Installs the console layer and, outside dry runs, the run log layer.
///
/// Priority: `RUST_LOG` env var > CLI flags > config file > default (info).
fn init_tracing(
    args: &Args,
    file_config: &app_config::FileConfig,
    config: &RunConfig,
) -> Result<()> {
    let directive = args.log_directive(file_config.verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let file_layer = if config.dry_run {
        None
    } else {
        let writer = open_run_log(&config.output_dir)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(writer)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    Ok(())
}

fn open_run_log(output_dir: &Path) -> Result<File> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            output_dir.display()
        )
    })?;
    let path = output_dir.join(RUN_LOG_FILE);
    File::create(&path).with_context(|| format!("Failed to create log file '{}'", path.display()))
}
