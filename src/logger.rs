/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Session logging for Syn-Pyx-Core sync cycles: append-only
    file sink plus a stderr mirror, injected into collaborators
    rather than held as process-wide state.

  Security / Safety Notes:
    Log lines carry filenames, project names, and URLs only;
    payload contents are never echoed.

  Dependencies:
    chrono for timestamps, sha2 for the session digest.

  Operational Scope:
    One logger per sync cycle; finalize() seals the session
    log with a SHA-256 digest sidecar.

  Revision History:
    2025-11-12 COD  Established logging module for Syn-Pyx-Core.
    2025-11-19 COD  Split the file sink out of the logger.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful degradation on log I/O failure
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynpyxError};

/// Severity of one log entry.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Warnings and errors always reach stderr; quieter levels only when
    /// the operator asked for them.
    fn mirrored_to_stderr(self, verbose: bool) -> bool {
        verbose || matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

/// Append-only session file underneath the logger.
struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                SynpyxError::Filesystem(format!(
                    "Failed to create log directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| {
                SynpyxError::Filesystem(format!(
                    "Failed to open log file {}: {err}",
                    path.display()
                ))
            })?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(handle)),
        })
    }

    /// Best-effort append; a failing log file must never sink the cycle.
    fn append(&self, line: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            if writeln!(writer, "{line}").and_then(|_| writer.flush()).is_err() {
                eprintln!("[LOGGER] Failed to persist log entry");
            }
        }
    }

    /// Write the SHA-256 digest of the session log next to it.
    fn seal(&self) -> Result<()> {
        let data = std::fs::read(&self.path).map_err(|err| {
            SynpyxError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                self.path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session.log".to_string());
        let hash_path = self.path.with_file_name(format!("{name}.hash"));
        std::fs::write(&hash_path, format!("{digest:x}  {name}\n")).map_err(|err| {
            SynpyxError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })
    }
}

/// Logger emitting Synavera-format entries to stderr and, when configured,
/// to an append-only session file.
pub struct Logger {
    sink: Option<FileSink>,
    verbose: bool,
}

impl Logger {
    /// Build a logger mirroring to stderr and appending to `path` when set.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let sink = path.map(FileSink::open).transpose()?;
        Ok(Self { sink, verbose })
    }

    /// A logger with no backing file, used by tests and dry runs.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            verbose: false,
        }
    }

    /// Emit one entry with the given level, code, and message.
    pub fn log(&self, level: LogLevel, code: &str, message: impl AsRef<str>) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = format!("{timestamp} [{}] [{code}] {}", level.label(), message.as_ref());

        if level.mirrored_to_stderr(self.verbose) {
            eprintln!("{line}");
        }
        if let Some(sink) = &self.sink {
            sink.append(&line);
        }
    }

    pub fn debug(&self, code: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, code, message);
    }

    pub fn info(&self, code: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn(&self, code: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, code, message);
    }

    /// Seal the session log with its digest sidecar. A no-op without a file.
    pub fn finalize(&self) -> Result<()> {
        match &self.sink {
            Some(sink) => sink.seal(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_always_reach_stderr_quiet_levels_need_verbose() {
        assert!(LogLevel::Warn.mirrored_to_stderr(false));
        assert!(LogLevel::Error.mirrored_to_stderr(false));
        assert!(!LogLevel::Info.mirrored_to_stderr(false));
        assert!(!LogLevel::Debug.mirrored_to_stderr(false));
        assert!(LogLevel::Info.mirrored_to_stderr(true));
        assert!(LogLevel::Debug.mirrored_to_stderr(true));
    }

    #[test]
    fn finalize_writes_a_digest_sidecar() {
        let dir = std::env::temp_dir().join(format!("synpyx-log-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("session.log");

        let logger = Logger::new(Some(path.clone()), false).unwrap();
        logger.info("TEST", "one line");
        logger.finalize().unwrap();

        let sidecar = dir.join("session.log.hash");
        let sealed = std::fs::read_to_string(&sidecar).unwrap();
        let expected = format!("{:x}", Sha256::digest(std::fs::read(&path).unwrap()));
        assert!(sealed.starts_with(&expected));
        assert!(sealed.trim_end().ends_with("session.log"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn disabled_logger_finalizes_to_nothing() {
        let logger = Logger::disabled();
        logger.info("TEST", "goes nowhere");
        assert!(logger.finalize().is_ok());
    }
}
