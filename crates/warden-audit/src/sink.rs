//! Audit sinks.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Consumer of audit records: one timestamp and an ordered list of fields
/// per event.
///
/// Embedders plug in their own sinks (scripted loggers, remote collectors)
/// by implementing this trait.
pub trait AuditSink: Send + Sync {
    fn record(&self, timestamp: &str, fields: &[String]) -> io::Result<()>;
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, timestamp: &str, fields: &[String]) -> io::Result<()> {
        (**self).record(timestamp, fields)
    }
}

/// Appends one JSON array per record to a file, or to stdout.
pub struct JsonLinesLog {
    target: Mutex<Target>,
}

struct Target {
    path: Option<PathBuf>,
    writer: Box<dyn Write + Send>,
}

impl JsonLinesLog {
    /// Open `path` for appending. An empty path, or a file that cannot be
    /// opened, sends records to stdout instead.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            target: Mutex::new(open_target(path.as_ref())),
        }
    }

    pub fn stdout() -> Self {
        Self::open("")
    }

    /// The file being written, `None` for stdout.
    pub fn path(&self) -> Option<PathBuf> {
        self.target.lock().path.clone()
    }

    /// Close and reopen the file, e.g. after rotation.
    pub fn reopen(&self) {
        let mut target = self.target.lock();
        let path = target.path.clone().unwrap_or_default();
        *target = open_target(&path);
    }
}

impl std::fmt::Debug for JsonLinesLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesLog")
            .field("path", &self.path())
            .finish()
    }
}

fn open_target(path: &Path) -> Target {
    if !path.as_os_str().is_empty() {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                return Target {
                    path: Some(path.to_path_buf()),
                    writer: Box::new(file),
                };
            }
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "could not open log file, sending records to stdout"
            ),
        }
    }
    Target {
        path: None,
        writer: Box::new(io::stdout()),
    }
}

impl AuditSink for JsonLinesLog {
    fn record(&self, timestamp: &str, fields: &[String]) -> io::Result<()> {
        let row: Vec<&str> = std::iter::once(timestamp)
            .chain(fields.iter().map(String::as_str))
            .collect();
        let mut line = serde_json::to_vec(&row).map_err(io::Error::other)?;
        line.push(b'\n');

        let mut target = self.target.lock();
        target.writer.write_all(&line)?;
        target.writer.flush()
    }
}
