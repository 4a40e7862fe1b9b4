/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::sync
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Drive one full sync cycle: local inventory capture, remote
    snapshot, delta computation, pending-unit materialization,
    and hand-off to the commit sink.

  Security / Safety Notes:
    The orchestrator never persists content itself; ownership
    of every pending unit passes to the sink.

  Dependencies:
    async-trait for collaborator seams, tokio-util for
    cooperative cancellation.

  Operational Scope:
    Invoked once per cycle by the binary entry point; a new
    cycle always starts from Idle.

  Revision History:
    2025-11-12 COD  Authored sync orchestrator.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Strictly ordered stages with per-stage failure attribution
    - Lazy pending-unit emission with a declared total
    - Terminal summaries that distinguish "unchanged" from
      "partially failed"
============================================================*/

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::delta::{find_delta, Delta};
use crate::error::{Result, SynpyxError};
use crate::index::{RemoteIndex, RemoteSnapshot};
use crate::logger::Logger;
use crate::record::PackageRecord;

/// Stages of one sync cycle. `Failed` is reachable from any stage whose
/// collaborator errors; no stage is re-entered within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Idle,
    FetchingLocalInventory,
    FetchingRemoteIndex,
    ComputingDelta,
    BuildingPendingUnits,
    Committing,
    Done,
    Failed,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStage::Idle => "Idle",
            SyncStage::FetchingLocalInventory => "FetchingLocalInventory",
            SyncStage::FetchingRemoteIndex => "FetchingRemoteIndex",
            SyncStage::ComputingDelta => "ComputingDelta",
            SyncStage::BuildingPendingUnits => "BuildingPendingUnits",
            SyncStage::Committing => "Committing",
            SyncStage::Done => "Done",
            SyncStage::Failed => "Failed",
        }
    }
}

/// Reference to the one not-yet-fetched artifact behind a pending unit. The
/// checksum, when present, is the addressing key the sink verifies against
/// the fetched bytes; the relative path derives from the filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact {
    pub url: String,
    pub sha256: Option<String>,
    pub relative_path: String,
}

/// One addition record paired with its artifact reference, ready for the
/// commit sink to fetch, persist, and link.
#[derive(Debug, Clone)]
pub struct PendingUnit {
    pub record: PackageRecord,
    pub artifact: PendingArtifact,
}

impl PendingUnit {
    /// Separate the artifact reference out of an addition record.
    fn from_addition(record: PackageRecord) -> Self {
        let artifact = PendingArtifact {
            url: record.url.clone(),
            sha256: record.sha256.clone(),
            relative_path: record.filename.clone(),
        };
        Self { record, artifact }
    }
}

/// Single-pass, finite, non-restartable sequence of pending units with its
/// total count declared up front, so progress reporting never has to
/// materialize the whole sequence.
pub struct PendingStream {
    units: Box<dyn Iterator<Item = PendingUnit> + Send>,
    declared: usize,
}

impl PendingStream {
    pub fn new(
        units: impl Iterator<Item = PendingUnit> + Send + 'static,
        declared: usize,
    ) -> Self {
        Self {
            units: Box::new(units),
            declared,
        }
    }

    /// Total number of units the producer intends to emit.
    pub fn declared(&self) -> usize {
        self.declared
    }
}

impl Iterator for PendingStream {
    type Item = PendingUnit;

    fn next(&mut self) -> Option<PendingUnit> {
        self.units.next()
    }
}

/// Lazily pair each addition with its artifact reference. Emission stops at
/// the first check after cancellation is requested.
fn build_additions(
    additions: Vec<PackageRecord>,
    cancel: CancellationToken,
) -> impl Iterator<Item = PendingUnit> {
    additions
        .into_iter()
        .take_while(move |_| !cancel.is_cancelled())
        .map(PendingUnit::from_addition)
}

/// Per-unit failure reported back by the commit sink.
#[derive(Debug, Clone, Serialize)]
pub struct CommitFailure {
    pub filename: String,
    pub reason: String,
}

/// Outcome of applying one cycle's additions.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub applied: usize,
    pub failures: Vec<CommitFailure>,
}

/// Capability to list filenames committed for the sync target. Must reflect
/// committed state at call time; the result is treated as an immutable
/// snapshot for the rest of the cycle.
#[async_trait]
pub trait ContentInventory: Send + Sync {
    async fn list_filenames(&self) -> Result<HashSet<String>>;
}

/// Capability to commit one cycle's changes. `apply` guarantees at-most-one
/// persisted record per filename even under internal retry and reports
/// per-unit outcomes rather than failing wholesale; `retire` drops content
/// scheduled for removal and reports how many units it retired.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn apply(&self, additions: PendingStream, logger: &Logger) -> Result<CommitReport>;
    async fn retire(&self, removals: &[PackageRecord], logger: &Logger) -> Result<usize>;
}

/// Terminal summary of one cycle. Counts let operators distinguish "nothing
/// changed" from "sync partially failed".
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub completed_at: String,
    pub mirror: bool,
    pub projects: usize,
    pub additions_found: usize,
    pub additions_committed: usize,
    pub additions_failed: usize,
    pub removals_found: usize,
    pub removals_committed: usize,
    pub skipped_projects: usize,
    pub malformed_records: usize,
    pub unverified_units: usize,
    pub failures: Vec<CommitFailure>,
}

impl SyncSummary {
    /// True when every pending unit landed.
    pub fn fully_applied(&self) -> bool {
        self.additions_failed == 0
    }
}

/// Delta preview produced by dry runs: what a cycle would change, plus the
/// hygiene counters from the remote capture.
#[derive(Debug)]
pub struct CyclePreview {
    pub delta: Delta,
    pub skipped_projects: usize,
    pub malformed_records: usize,
    pub unverified_records: usize,
}

/// Orchestrates one full sync cycle over injected collaborators.
pub struct SyncOrchestrator<'a> {
    inventory: &'a dyn ContentInventory,
    index: &'a dyn RemoteIndex,
    sink: &'a dyn ChangeSink,
    logger: &'a Logger,
    cancel: CancellationToken,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        inventory: &'a dyn ContentInventory,
        index: &'a dyn RemoteIndex,
        sink: &'a dyn ChangeSink,
        logger: &'a Logger,
    ) -> Self {
        Self {
            inventory,
            index,
            sink,
            logger,
            cancel: CancellationToken::new(),
        }
    }

    /// Install a cancellation token checked between project fetches and
    /// between pending-unit emissions.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Capture both snapshots and compute the delta. Shared by real cycles
    /// and dry runs; both snapshots are taken once and never re-queried.
    async fn capture(
        &self,
        projects: &[String],
        mirror: bool,
    ) -> Result<(Delta, RemoteSnapshot)> {
        let stage = SyncStage::FetchingLocalInventory;
        self.logger.info("STAGE", stage.as_str());
        let local = self
            .inventory
            .list_filenames()
            .await
            .map_err(|err| SynpyxError::aborted_at(stage.as_str(), err))?;
        self.logger
            .info("LOCAL", format!("Inventory holds {} filenames", local.len()));

        let stage = SyncStage::FetchingRemoteIndex;
        self.logger.info("STAGE", stage.as_str());
        let snapshot = self
            .index
            .fetch_all(projects, &self.cancel, self.logger)
            .await
            .map_err(|err| SynpyxError::aborted_at(stage.as_str(), err))?;

        let stage = SyncStage::ComputingDelta;
        self.logger.info("STAGE", stage.as_str());
        let RemoteSnapshot {
            records,
            skipped_projects,
            malformed_records,
            unverified_records,
        } = snapshot;
        let delta = find_delta(&local, records, mirror);
        self.logger.info(
            "DELTA",
            format!(
                "additions={} removals={}",
                delta.additions.len(),
                delta.removals.len()
            ),
        );
        Ok((
            delta,
            RemoteSnapshot {
                records: Vec::new(),
                skipped_projects,
                malformed_records,
                unverified_records,
            },
        ))
    }

    /// Compute what a cycle would change without committing anything.
    pub async fn preview(&self, projects: &[String], mirror: bool) -> Result<CyclePreview> {
        let (delta, counters) = self.capture(projects, mirror).await?;
        Ok(CyclePreview {
            delta,
            skipped_projects: counters.skipped_projects,
            malformed_records: counters.malformed_records,
            unverified_records: counters.unverified_records,
        })
    }

    /// Run one full cycle and return its terminal summary.
    ///
    /// Stage order is fixed: local inventory, remote index, delta,
    /// pending-unit build, commit. An unrecoverable collaborator error is
    /// wrapped with the stage it sank; per-unit commit failures are carried
    /// in the summary instead, never silently dropped.
    pub async fn sync(&self, projects: &[String], mirror: bool) -> Result<SyncSummary> {
        self.logger.info(
            "SYNC",
            format!(
                "Cycle starting: projects={} mirror={mirror}",
                projects.len()
            ),
        );
        let (delta, counters) = self.capture(projects, mirror).await?;

        let stage = SyncStage::BuildingPendingUnits;
        self.logger.info("STAGE", stage.as_str());
        let declared = delta.additions.len();
        let removals = delta.removals;
        let removals_found = removals.len();
        let stream = PendingStream::new(
            build_additions(delta.additions, self.cancel.clone()),
            declared,
        );

        let stage = SyncStage::Committing;
        self.logger.info("STAGE", stage.as_str());
        let report = self
            .sink
            .apply(stream, self.logger)
            .await
            .map_err(|err| SynpyxError::aborted_at(stage.as_str(), err))?;
        if self.cancel.is_cancelled() {
            return Err(SynpyxError::aborted_at(
                stage.as_str(),
                SynpyxError::Runtime("Cancellation requested".into()),
            ));
        }
        let removals_committed = if mirror && removals_found > 0 {
            self.sink
                .retire(&removals, self.logger)
                .await
                .map_err(|err| SynpyxError::aborted_at(stage.as_str(), err))?
        } else {
            0
        };

        let summary = SyncSummary {
            completed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            mirror,
            projects: projects.len(),
            additions_found: declared,
            additions_committed: report.applied,
            additions_failed: report.failures.len(),
            removals_found,
            removals_committed,
            skipped_projects: counters.skipped_projects,
            malformed_records: counters.malformed_records,
            unverified_units: counters.unverified_records,
            failures: report.failures,
        };

        for failure in &summary.failures {
            self.logger.warn(
                "COMMIT",
                format!("{}: {}", failure.filename, failure.reason),
            );
        }
        self.logger.info("STAGE", SyncStage::Done.as_str());
        self.logger.info(
            "SUMMARY",
            format!(
                "additions found={} committed={} failed={} removals found={} committed={}",
                summary.additions_found,
                summary.additions_committed,
                summary.additions_failed,
                summary.removals_found,
                summary.removals_committed
            ),
        );
        Ok(summary)
    }
}
