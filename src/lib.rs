/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Library surface of Syn-Pyx Core: the sync cycle engine
    reconciling a local artifact spool against a remote
    package index.

  Security / Safety Notes:
    See individual modules; the library performs network and
    filesystem I/O only through injected capabilities.

  Dependencies:
    Declared in Cargo.toml; module headers name their own.

  Operational Scope:
    Consumed by the synpyx_core binary and by integration
    tests driving full cycles against fake collaborators.

  Revision History:
    2025-11-12 COD  Exposed library crate surface.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Narrow public surface, one concern per module
    - Capabilities injected at the seams
============================================================*/

pub mod config;
pub mod delta;
pub mod error;
pub mod index;
pub mod logger;
pub mod record;
pub mod store;
pub mod sync;

pub use config::{FetchErrorPolicy, IndexConfig, MalformedPolicy, SynpyxConfig};
pub use delta::{find_delta, Delta};
pub use error::{Result, SynpyxError};
pub use index::{HttpFetcher, IndexClient, RemoteFetch, RemoteIndex, RemoteSnapshot};
pub use logger::{LogLevel, Logger};
pub use record::{normalize, PackageRecord, METADATA_VERSION};
pub use store::FsStore;
pub use sync::{
    ChangeSink, CommitFailure, CommitReport, ContentInventory, CyclePreview, PendingArtifact,
    PendingStream, PendingUnit, SyncOrchestrator, SyncStage, SyncSummary,
};
