/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::store
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Filesystem-backed content store: spool-directory inventory
    plus the commit sink that fetches, verifies, and lands
    pending artifacts.

  Security / Safety Notes:
    Relative paths are validated before any write; artifacts
    land via staging files so a crash never leaves a partial
    committed file.

  Dependencies:
    tokio::fs for async I/O, sha2 for digest verification.

  Operational Scope:
    Default collaborator pair wired by the binary entry point;
    library users may substitute their own implementations.

  Revision History:
    2025-11-12 COD  Authored spool store and commit sink.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Stage-then-rename commits, idempotent per filename
    - Per-unit failure reporting, no wholesale aborts
    - No retry at this layer; one attempt per unit per cycle
============================================================*/

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{Result, SynpyxError};
use crate::index::RemoteFetch;
use crate::logger::Logger;
use crate::record::PackageRecord;
use crate::sync::{ChangeSink, CommitFailure, CommitReport, ContentInventory, PendingStream};

/// Suffix for staging files; entries carrying it are never part of the
/// committed inventory.
const STAGING_SUFFIX: &str = ".part";

/// Spool-directory store for mirrored artifacts. One flat directory, one
/// file per committed content unit, keyed by filename.
pub struct FsStore {
    root: PathBuf,
    fetcher: Arc<dyn RemoteFetch>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn RemoteFetch>) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|err| {
            SynpyxError::Filesystem(format!(
                "Failed to create spool directory {}: {err}",
                self.root.display()
            ))
        })
    }

    /// Land one artifact: fetch, verify, stage, rename. Returns the reason
    /// string on failure so the caller can fold it into the commit report.
    async fn land(&self, url: &str, relative_path: &str, sha256: Option<&str>) -> std::result::Result<(), String> {
        if !is_safe_relative_path(relative_path) {
            return Err(format!("unsafe relative path `{relative_path}`"));
        }

        let committed = self.root.join(relative_path);
        if fs::try_exists(&committed)
            .await
            .map_err(|err| format!("cannot probe {}: {err}", committed.display()))?
        {
            // Already committed by an earlier cycle; re-sync is idempotent.
            return Ok(());
        }

        let payload = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|err| err.to_string())?;

        if let Some(expected) = sha256 {
            if !digest_matches(expected, &payload) {
                return Err(format!("sha256 mismatch for {relative_path}"));
            }
        }

        let staging = self.root.join(format!("{relative_path}{STAGING_SUFFIX}"));
        if let Err(err) = fs::write(&staging, &payload).await {
            return Err(format!("failed to stage {}: {err}", staging.display()));
        }
        if let Err(err) = fs::rename(&staging, &committed).await {
            let _ = fs::remove_file(&staging).await;
            return Err(format!("failed to commit {}: {err}", committed.display()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentInventory for FsStore {
    /// List committed filenames. A missing spool directory is an empty
    /// inventory, not an error; staging files are excluded.
    async fn list_filenames(&self) -> Result<HashSet<String>> {
        let mut inventory = HashSet::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(inventory),
            Err(err) => {
                return Err(SynpyxError::Filesystem(format!(
                    "Failed to read spool directory {}: {err}",
                    self.root.display()
                )))
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|err| {
            SynpyxError::Filesystem(format!(
                "Failed to enumerate spool directory {}: {err}",
                self.root.display()
            ))
        })? {
            let file_type = entry.file_type().await.map_err(SynpyxError::Io)?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(STAGING_SUFFIX) {
                continue;
            }
            inventory.insert(name);
        }
        Ok(inventory)
    }
}

#[async_trait]
impl ChangeSink for FsStore {
    /// Drain the pending stream, landing each artifact once. Failures are
    /// collected per unit and never retried here.
    async fn apply(&self, additions: PendingStream, logger: &Logger) -> Result<CommitReport> {
        self.ensure_root().await.map_err(|err| {
            SynpyxError::Commit(format!("spool unavailable: {err}"))
        })?;

        let declared = additions.declared();
        let mut report = CommitReport::default();
        for unit in additions {
            let artifact = &unit.artifact;
            match self
                .land(
                    &artifact.url,
                    &artifact.relative_path,
                    artifact.sha256.as_deref(),
                )
                .await
            {
                Ok(()) => {
                    report.applied += 1;
                    logger.debug(
                        "APPLY",
                        format!(
                            "{} ({}/{declared})",
                            artifact.relative_path, report.applied
                        ),
                    );
                }
                Err(reason) => {
                    report.failures.push(CommitFailure {
                        filename: unit.record.filename.clone(),
                        reason,
                    });
                }
            }
        }

        logger.info(
            "APPLY",
            format!(
                "Committed {}/{declared} unit(s), {} failure(s)",
                report.applied,
                report.failures.len()
            ),
        );
        Ok(report)
    }

    /// Delete retired content. A file already absent still counts as
    /// retired: the desired end state holds either way.
    async fn retire(&self, removals: &[PackageRecord], logger: &Logger) -> Result<usize> {
        let mut retired = 0usize;
        for record in removals {
            if !is_safe_relative_path(&record.filename) {
                logger.warn(
                    "RETIRE",
                    format!("Refusing unsafe filename `{}`", record.filename),
                );
                continue;
            }
            let path = self.root.join(&record.filename);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    retired += 1;
                    logger.debug("RETIRE", record.filename.as_str());
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    retired += 1;
                    logger.debug(
                        "RETIRE",
                        format!("{} was already absent", record.filename),
                    );
                }
                Err(err) => {
                    logger.warn(
                        "RETIRE",
                        format!("Failed to remove {}: {err}", path.display()),
                    );
                }
            }
        }
        logger.info(
            "RETIRE",
            format!("Retired {retired}/{} unit(s)", removals.len()),
        );
        Ok(retired)
    }
}

/// A spool entry must stay inside the spool: plain filenames only.
fn is_safe_relative_path(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Compare a fetched payload against its expected lowercase-hex sha256.
fn digest_matches(expected: &str, payload: &[u8]) -> bool {
    let actual = format!("{:x}", Sha256::digest(payload));
    actual == expected.to_ascii_lowercase()
}
