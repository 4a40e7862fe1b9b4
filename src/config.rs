/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load and validate Syn-Pyx-Core configuration: index
    endpoint, retry and parallelism knobs, failure policies,
    spool and log locations, and the default project list.

  Security / Safety Notes:
    Configuration is read from operator-controlled paths only;
    no values are written back.

  Dependencies:
    serde + toml for parsing, dirs for XDG-derived defaults.

  Operational Scope:
    Resolved once at startup and threaded by reference into the
    index client, store, and orchestrator.

  Revision History:
    2025-11-12 COD  Authored configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults with operator override points
    - Validation before first use, not at point of failure
    - No hidden environment lookups beyond documented paths
============================================================*/

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynpyxError};

/// Policy applied when one project's index fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Abort the whole cycle, naming the failing project.
    Abort,
    /// Log the failure and continue with the remaining projects.
    Skip,
}

/// Policy applied when one distribution record lacks a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Skip the record, count it, and continue.
    Skip,
    /// Abort the project fetch on the first malformed record.
    Abort,
}

/// Settings for the remote index client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub max_retries: usize,
    pub max_parallel_requests: usize,
    pub on_fetch_error: FetchErrorPolicy,
    pub on_malformed: MalformedPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pypi.org".to_string(),
            timeout: 30,
            max_retries: 3,
            max_parallel_requests: 4,
            on_fetch_error: FetchErrorPolicy::Abort,
            on_malformed: MalformedPolicy::Skip,
        }
    }
}

/// Settings for the local artifact spool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: Option<PathBuf>,
}

/// Settings for session logging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
}

/// Root configuration document for Syn-Pyx-Core.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynpyxConfig {
    pub index: IndexConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    /// Projects synced when none are named on the command line.
    pub projects: Vec<String>,
    /// Default sync policy; `--mirror` overrides to true.
    pub mirror: bool,
}

impl SynpyxConfig {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. A missing file yields built-in defaults; a file
    /// that exists but fails to parse is a hard error.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(SynpyxError::Config(format!(
                        "Configuration file {} does not exist",
                        explicit.display()
                    )));
                }
                Some(explicit.to_path_buf())
            }
            None => {
                let default = Self::default_path();
                default.filter(|p| p.exists())
            }
        };

        let config = match resolved {
            Some(file) => {
                let raw = fs::read_to_string(&file).map_err(|err| {
                    SynpyxError::Config(format!(
                        "Failed to read configuration {}: {err}",
                        file.display()
                    ))
                })?;
                toml::from_str::<SynpyxConfig>(&raw).map_err(|err| {
                    SynpyxError::Config(format!(
                        "Failed to parse configuration {}: {err}",
                        file.display()
                    ))
                })?
            }
            None => SynpyxConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("synpyx").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.index.base_url.trim().is_empty() {
            return Err(SynpyxError::Config("index.base_url must not be empty".into()));
        }
        if self.index.timeout == 0 {
            return Err(SynpyxError::Config("index.timeout must be positive".into()));
        }
        Ok(())
    }

    /// Spool directory holding committed artifacts.
    pub fn store_root(&self) -> PathBuf {
        self.store.root.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("synpyx")
                .join("spool")
        })
    }

    /// Directory receiving per-session log files.
    pub fn log_dir(&self) -> PathBuf {
        self.log.dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("synpyx")
                .join("logs")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_additive_and_abort_on_fetch_error() {
        let config = SynpyxConfig::default();
        assert!(!config.mirror);
        assert_eq!(config.index.on_fetch_error, FetchErrorPolicy::Abort);
        assert_eq!(config.index.on_malformed, MalformedPolicy::Skip);
        assert_eq!(config.index.base_url, "https://pypi.org");
    }

    #[test]
    fn policies_parse_from_toml() {
        let parsed: SynpyxConfig = toml::from_str(
            r#"
            projects = ["shelf", "aiohttp"]
            mirror = true

            [index]
            base_url = "https://mirror.internal/pypi"
            on_fetch_error = "skip"
            on_malformed = "abort"
            "#,
        )
        .expect("valid config");
        assert_eq!(parsed.projects.len(), 2);
        assert!(parsed.mirror);
        assert_eq!(parsed.index.on_fetch_error, FetchErrorPolicy::Skip);
        assert_eq!(parsed.index.on_malformed, MalformedPolicy::Abort);
        assert_eq!(parsed.index.base_url, "https://mirror.internal/pypi");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let parsed: SynpyxConfig = toml::from_str("[index]\ntimeout = 0\n").expect("parses");
        assert!(parsed.validate().is_err());
    }
}
