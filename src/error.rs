/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Pyx-Core error types to provide consistent
    diagnostics and exit semantics across a sync cycle.

  Security / Safety Notes:
    Error contexts redact potentially sensitive data such as
    credentials or tokens; only URLs and filenames are exposed.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2025-11-12 COD  Established shared error definitions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Pyx-Core operations.
pub type Result<T> = std::result::Result<T, SynpyxError>;

/// Enumerates high-level error domains surfaced by Syn-Pyx-Core.
#[derive(Debug, Error)]
pub enum SynpyxError {
    #[error("Distribution record rejected: missing required field `{field}` ({context})")]
    MalformedRecord { field: String, context: String },
    #[error("Fetch failed for project `{project}`: {reason}")]
    Fetch { project: String, reason: String },
    #[error("Sync cycle aborted during {stage}: {cause}")]
    SyncAborted {
        stage: String,
        #[source]
        cause: Box<SynpyxError>,
    },
    #[error("Commit: {0}")]
    Commit(String),
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynpyxError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynpyxError::Config(_) => ExitCode::from(20),
            SynpyxError::Fetch { .. } => ExitCode::from(30),
            SynpyxError::Serialization(_) => ExitCode::from(31),
            SynpyxError::MalformedRecord { .. } => ExitCode::from(32),
            SynpyxError::Filesystem(_) => ExitCode::from(40),
            SynpyxError::Io(_) => ExitCode::from(41),
            SynpyxError::Commit(_) => ExitCode::from(45),
            SynpyxError::Runtime(_) => ExitCode::from(50),
            // The wrapper surfaces the code of whatever sank the cycle.
            SynpyxError::SyncAborted { cause, .. } => cause.exit_code(),
        }
    }

    /// Wrap an error as a cycle-level abort attributed to `stage`.
    pub fn aborted_at(stage: impl Into<String>, cause: SynpyxError) -> SynpyxError {
        SynpyxError::SyncAborted {
            stage: stage.into(),
            cause: Box::new(cause),
        }
    }
}
