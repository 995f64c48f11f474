//! Logging utilities for the stats sidecar.
//!
//! Log lines go to stdout and, optionally, to a rotating local file.
//! The file sink writes through a non-blocking worker; keep the returned
//! [`WorkerGuard`] alive for the lifetime of the process or buffered lines
//! are lost on exit.

use crate::appender::{Limits, SizeRollingAppender};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const MEGABYTE: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rotating file sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSink {
    /// Directory holding the log files
    pub directory: PathBuf,

    /// Name of the active file; backups append `.1`, `.2`, ...
    pub file_name: String,

    /// Size in megabytes at which the file is rolled
    pub max_size_mb: u64,

    /// Number of rolled files kept on disk
    pub max_backups: usize,

    /// Rolled files older than this many days are removed (0 keeps them)
    pub max_age_days: u64,
}

impl Default for FileSink {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_name: "sidecar.log".to_string(),
            max_size_mb: 1,
            max_backups: 3,
            max_age_days: 28,
        }
    }
}

impl FileSink {
    /// Retention limits for the appender
    pub fn limits(&self) -> Limits {
        Limits {
            max_size: self.max_size_mb.saturating_mul(MEGABYTE),
            max_backups: self.max_backups,
            max_age: (self.max_age_days > 0)
                .then(|| Duration::from_secs(self.max_age_days.saturating_mul(SECONDS_PER_DAY))),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines instead of the human readable format
    pub json: bool,

    /// Optional rotating file sink
    pub file: Option<FileSink>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: Some(FileSink::default()),
        }
    }
}

/// Open the size-bounded appender for a file sink.
pub fn build_appender(sink: &FileSink) -> Result<SizeRollingAppender> {
    SizeRollingAppender::open(sink.directory.join(&sink.file_name), sink.limits()).map_err(|e| {
        Error::logging(format!(
            "cannot open log file in {}: {}",
            sink.directory.display(),
            e
        ))
    })
}

/// Initialize tracing with stdout output and the optional file sink.
///
/// Uses the RUST_LOG environment variable when set, `settings.level`
/// otherwise. Returns the file writer guard when a file sink is configured.
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let (file_writer, guard) = match &settings.file {
        Some(sink) => {
            let (writer, guard) = tracing_appender::non_blocking(build_appender(sink)?);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    if settings.json {
        let file_layer = file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .with(file_layer)
            .try_init()
            .map_err(Error::logging)?;
    } else {
        let file_layer = file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .with(file_layer)
            .try_init()
            .map_err(Error::logging)?;
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_file_sink() {
        let sink = FileSink::default();
        assert_eq!(sink.file_name, "sidecar.log");
        assert_eq!(
            sink.limits(),
            Limits {
                max_size: MEGABYTE,
                max_backups: 3,
                max_age: Some(Duration::from_secs(28 * SECONDS_PER_DAY)),
            }
        );
    }

    #[test]
    fn test_zero_age_keeps_backups() {
        let sink: FileSink = serde_json::from_str(r#"{"max_age_days": 0}"#).unwrap();
        assert_eq!(sink.limits().max_age, None);
        assert_eq!(sink.max_backups, 3);
    }

    #[test]
    fn test_build_appender_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink {
            directory: dir.path().join("logs"),
            file_name: "test.log".to_string(),
            ..FileSink::default()
        };

        let mut appender = build_appender(&sink).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let written = std::fs::read_to_string(dir.path().join("logs/test.log")).unwrap();
        assert_eq!(written, "hello\n");
    }
}
