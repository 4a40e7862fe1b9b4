/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Pyx Core. Resolves configuration,
    wires the index client and spool store into the sync
    orchestrator, runs one cycle, and reports the outcome.

  Security / Safety Notes:
    Operates within user privileges. Performs HTTPS GET
    requests and writes only under operator-controlled paths.

  Dependencies:
    clap for CLI parsing, chrono for session stamps.

  Operational Scope:
    Invoked by the Syn-Pyx scheduler via `syn-pyx core` or when
    operators require a standalone sync cycle.

  Revision History:
    2025-11-12 COD  Authored Syn-Pyx Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;

use synpyx_core::config::SynpyxConfig;
use synpyx_core::error::{Result, SynpyxError};
use synpyx_core::index::{HttpFetcher, IndexClient, RemoteFetch};
use synpyx_core::logger::Logger;
use synpyx_core::store::FsStore;
use synpyx_core::sync::{CyclePreview, SyncOrchestrator, SyncSummary};

/// Exit code for a cycle that completed with per-unit commit failures, so
/// schedulers can tell "partially failed" apart from "clean" and "aborted".
const PARTIAL_FAILURE_EXIT: u8 = 12;

/// Command-line arguments for Syn-Pyx-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Pyx-Core",
    version,
    author = "Synavera Systems",
    about = "Package index mirror core for Syn-Pyx"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Project to sync; repeatable. Overrides the configured list.
    #[arg(long = "project", value_name = "NAME", action = ArgAction::Append)]
    projects: Vec<String>,
    /// Mirror mode: schedule local content absent upstream for removal.
    #[arg(long, action = ArgAction::SetTrue)]
    mirror: bool,
    /// Compute and report the delta without committing anything.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Override spool directory.
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
    /// Write the cycle summary as JSON to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Pyx-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = SynpyxConfig::load_from_optional_path(cli.config.as_deref())?;

    let projects = if cli.projects.is_empty() {
        config.projects.clone()
    } else {
        cli.projects.clone()
    };
    if projects.is_empty() {
        return Err(SynpyxError::Config(
            "No projects selected; pass --project or configure a project list".into(),
        ));
    }
    let mirror = cli.mirror || config.mirror;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .or_else(|| Some(config.log_dir().join(format!("sync_{session_stamp}.log"))));
    let logger = Logger::new(log_path, cli.verbose)?;
    logger.info("INIT", "Syn-Pyx Core awakening.");

    let fetcher: Arc<dyn RemoteFetch> = Arc::new(HttpFetcher::new(&config.index)?);
    let index = IndexClient::new(fetcher.clone(), &config.index);
    let store_root = cli.store.clone().unwrap_or_else(|| config.store_root());
    let store = FsStore::new(store_root, fetcher);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let orchestrator =
        SyncOrchestrator::new(&store, &index, &store, &logger).with_cancellation(cancel);

    let code = if cli.dry_run {
        let preview = orchestrator.preview(&projects, mirror).await?;
        print_preview(&preview, mirror);
        ExitCode::SUCCESS
    } else {
        let summary = orchestrator.sync(&projects, mirror).await?;
        if let Some(ref path) = cli.report {
            write_report(&summary, path)?;
            logger.info("REPORT", format!("Summary written to {}", path.display()));
        }
        print_summary(&summary);
        if summary.fully_applied() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(PARTIAL_FAILURE_EXIT)
        }
    };

    logger.info("COMPLETE", "Inventory reconciled.");
    logger.finalize()?;
    Ok(code)
}

fn print_preview(preview: &CyclePreview, mirror: bool) {
    println!(
        "→ Sync dry-run. Additions={} Removals={} (mirror={mirror}, skipped projects={}, malformed records={})",
        preview.delta.additions.len(),
        preview.delta.removals.len(),
        preview.skipped_projects,
        preview.malformed_records
    );
}

fn print_summary(summary: &SyncSummary) {
    println!(
        "→ Sync cycle complete. Additions found={} committed={} failed={} | Removals found={} committed={}",
        summary.additions_found,
        summary.additions_committed,
        summary.additions_failed,
        summary.removals_found,
        summary.removals_committed
    );
}

/// Persist the cycle summary to the given path.
fn write_report(summary: &SyncSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynpyxError::Filesystem(format!(
                "Failed to create report directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        SynpyxError::Filesystem(format!(
            "Failed to create report file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, summary).map_err(|err| {
        SynpyxError::Serialization(format!(
            "Failed to write report {}: {err}",
            path.display()
        ))
    })?;
    Ok(())
}
