//! Size-bounded log file writer.
//!
//! The active file is `<dir>/<name>`. Once a write would push it past the
//! size limit it is renamed to `<name>.1`, older backups shift up by one, and
//! anything beyond the backup count or older than the age limit is removed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Retention limits for [`SizeRollingAppender`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Size at which the active file is rolled
    pub max_size: u64,

    /// Rolled files kept on disk
    pub max_backups: usize,

    /// Rolled files older than this are deleted; `None` keeps them
    pub max_age: Option<Duration>,
}

/// Appending writer that rolls the file over by size
#[derive(Debug)]
pub struct SizeRollingAppender {
    path: PathBuf,
    file: File,
    written: u64,
    limits: Limits,
}

impl SizeRollingAppender {
    /// Open (or create) the active file, creating the directory if needed.
    pub fn open(path: impl Into<PathBuf>, limits: Limits) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        let appender = Self {
            path,
            file,
            written,
            limits,
        };
        appender.prune_expired();
        Ok(appender)
    }

    /// Path of the active file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `n`th backup (1 is the newest)
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}", n));
        self.path.with_file_name(name)
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let max = self.limits.max_backups;
        if max == 0 {
            fs::remove_file(&self.path)?;
        } else {
            let oldest = self.backup_path(max);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..max).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        self.file = open_append(&self.path)?;
        self.written = 0;
        self.prune_expired();
        Ok(())
    }

    fn prune_expired(&self) {
        let Some(max_age) = self.limits.max_age else {
            return;
        };
        let now = SystemTime::now();

        for n in 1..=self.limits.max_backups {
            let backup = self.backup_path(n);
            let expired = fs::metadata(&backup)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                // Losing a stale backup is not worth failing a log write over
                let _ = fs::remove_file(&backup);
            }
        }
    }
}

impl Write for SizeRollingAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limits.max_size {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
