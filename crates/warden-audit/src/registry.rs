//! Process-wide set of audit logs, owned explicitly by the application.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::record::{AccessRecord, TlsRecord, timestamp};
use crate::sink::{AuditSink, JsonLinesLog};

/// The access log, the TLS log and any custom logs opened by path.
///
/// Created once at startup and passed to whatever needs to log.
#[derive(Debug)]
pub struct AuditRegistry {
    access: JsonLinesLog,
    tls: JsonLinesLog,
    custom: Mutex<HashMap<PathBuf, Arc<JsonLinesLog>>>,
    log_user_agent: bool,
}

impl AuditRegistry {
    /// Open the access and TLS logs. Empty paths log to stdout.
    pub fn open(access_path: impl AsRef<Path>, tls_path: impl AsRef<Path>) -> Self {
        Self {
            access: JsonLinesLog::open(access_path),
            tls: JsonLinesLog::open(tls_path),
            custom: Mutex::new(HashMap::new()),
            log_user_agent: false,
        }
    }

    /// Include request user agents in access records.
    pub fn with_user_agent(mut self, enabled: bool) -> Self {
        self.log_user_agent = enabled;
        self
    }

    pub fn access(&self) -> &JsonLinesLog {
        &self.access
    }

    pub fn tls(&self) -> &JsonLinesLog {
        &self.tls
    }

    /// The log writing to `path`, opened on first request. Repeated calls
    /// with the same path share one log.
    pub fn custom_log(&self, path: impl AsRef<Path>) -> Arc<JsonLinesLog> {
        let path = path.as_ref();
        let mut custom = self.custom.lock();
        if let Some(log) = custom.get(path) {
            return Arc::clone(log);
        }
        let log = Arc::new(JsonLinesLog::open(path));
        custom.insert(path.to_path_buf(), Arc::clone(&log));
        log
    }

    /// Reopen every log file.
    pub fn reopen_all(&self) {
        self.access.reopen();
        self.tls.reopen();
        for log in self.custom.lock().values() {
            log.reopen();
        }
    }

    /// Write an access record; returns the fields written, timestamp first.
    pub fn log_access(&self, record: &AccessRecord) -> Vec<String> {
        let ts = timestamp();
        let fields = record.fields(self.log_user_agent);
        write_or_warn(&self.access, "access", &ts, &fields);
        std::iter::once(ts).chain(fields).collect()
    }

    pub fn log_tls(&self, record: &TlsRecord) {
        write_or_warn(&self.tls, "tls", &timestamp(), &record.fields());
    }
}

fn write_or_warn(sink: &dyn AuditSink, log: &'static str, ts: &str, fields: &[String]) {
    if let Err(e) = sink.record(ts, fields) {
        warn!(log, error = %e, "failed to write audit record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn custom_logs_are_shared_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AuditRegistry::open("", "");
        let a = registry.custom_log(dir.path().join("a.log"));
        let again = registry.custom_log(dir.path().join("a.log"));
        let b = registry.custom_log(dir.path().join("b.log"));
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn access_and_tls_records_reach_their_files() {
        let dir = tempfile::tempdir().unwrap();
        let access = dir.path().join("access.log");
        let tls = dir.path().join("tls.log");
        let registry = AuditRegistry::open(&access, &tls).with_user_agent(true);

        let record = AccessRecord {
            user: "alice".into(),
            url: "http://example.com/".into(),
            method: "GET".into(),
            status: Some(200),
            user_agent: "curl/8".into(),
            ..Default::default()
        };
        let written = registry.log_access(&record);
        registry.log_tls(&TlsRecord {
            user: "alice".into(),
            server_name: "example.com".into(),
            server_addr: "93.184.216.34:443".into(),
            ..Default::default()
        });

        let rows = read_rows(&access);
        assert_eq!(rows, vec![written]);
        assert_eq!(rows[0][1], "alice");
        assert_eq!(rows[0][2], "allow");
        assert_eq!(rows[0][14], "curl/8");
        assert_eq!(read_rows(&tls)[0][2], "example.com");
    }

    #[test]
    fn reopen_all_touches_custom_logs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.log");
        let registry = AuditRegistry::open("", "");
        let log = registry.custom_log(&path);
        log.record("t", &["one".into()]).unwrap();

        std::fs::remove_file(&path).unwrap();
        registry.reopen_all();
        log.record("t", &["two".into()]).unwrap();
        assert_eq!(read_rows(&path), vec![vec!["t".to_string(), "two".to_string()]]);
    }
}
