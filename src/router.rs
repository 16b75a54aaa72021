//! Scheme dispatch: picks the transport stack for a request URL.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Uri;
use tracing::warn;
use warden_audit::{AuditRegistry, TlsRecord};
use warden_config::TransportConfig;
use warden_transport::tls_config::{load_root_store, system_root_store};
use warden_transport::{
    ConnTransport, Fetch, FetchError, FetchRequest, FetchResponse, FtpBridge, Redial,
    RetryTransport, TcpConnector, TrustVerifier, VerifiedTlsStream,
};

/// Routes requests by URL scheme.
///
/// - `http`: retrying [`ConnTransport`] over TCP
/// - `https`: retrying [`ConnTransport`] over a [`TrustVerifier`] connection
/// - `ftp`: [`FtpBridge`]
///
/// Each [`transport_for`](Self::transport_for) call yields the transport of
/// one logical connection; callers keep it for as long as that connection
/// lives.
#[allow(missing_debug_implementations)]
pub struct Dispatcher {
    tcp: Arc<TcpConnector>,
    tls: Arc<TrustVerifier>,
    ftp: Arc<FtpBridge>,
    retry_attempts: u32,
    audit: Option<Arc<AuditRegistry>>,
}

impl Dispatcher {
    pub fn from_config(config: &TransportConfig) -> Result<Self, FetchError> {
        let tcp = TcpConnector::new()
            .with_connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .with_keepalive_secs(config.tcp_keepalive_secs)
            .with_nodelay(config.tcp_no_delay);

        let extra = config
            .extra_root_certs
            .as_deref()
            .map(|path| load_root_store(Path::new(path)))
            .transpose()?;
        let tls = TrustVerifier::with_roots(tcp.clone(), system_root_store(), extra)?
            .with_handshake_timeout(Duration::from_secs(config.tls_handshake_timeout_secs));
        let ftp = FtpBridge::new(tcp.clone())
            .with_credentials(config.ftp.user.as_str(), config.ftp.password.as_str());

        Ok(Self {
            tcp: Arc::new(tcp),
            tls: Arc::new(tls),
            ftp: Arc::new(ftp),
            retry_attempts: config.retry_attempts,
            audit: None,
        })
    }

    /// Write a TLS record for every TLS dial.
    pub fn with_audit(mut self, audit: Arc<AuditRegistry>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// A fresh transport for the origin of `uri`.
    pub fn transport_for(&self, uri: &Uri) -> Result<Box<dyn Fetch>, FetchError> {
        match uri.scheme_str() {
            Some("http") => {
                let addr = origin_addr(uri, 80)?;
                let conn = ConnTransport::lazy(self.tcp.redialer(addr));
                Ok(Box::new(
                    RetryTransport::new(conn).with_max_attempts(self.retry_attempts),
                ))
            }
            Some("https") => {
                let addr = origin_addr(uri, 443)?;
                let conn = ConnTransport::lazy(self.tls_redial(addr, server_name(uri)?));
                Ok(Box::new(
                    RetryTransport::new(conn).with_max_attempts(self.retry_attempts),
                ))
            }
            Some("ftp") => Ok(Box::new(Arc::clone(&self.ftp))),
            other => Err(FetchError::InvalidRequest(format!(
                "unsupported scheme: {}",
                other.unwrap_or("none")
            ))),
        }
    }

    fn tls_redial(
        &self,
        addr: String,
        server_name: String,
    ) -> impl Redial<VerifiedTlsStream> + use<> {
        let tls = Arc::clone(&self.tls);
        let audit = self.audit.clone();
        move || {
            let tls = Arc::clone(&tls);
            let audit = audit.clone();
            let addr = addr.clone();
            let server_name = server_name.clone();
            async move {
                let result = tls.connect_to(&addr, &server_name).await;
                if let Some(audit) = audit {
                    let record = TlsRecord {
                        server_name,
                        server_addr: addr,
                        error: result.as_ref().err().map(ToString::to_string),
                        ..Default::default()
                    };
                    write_audit(audit, move |audit| audit.log_tls(&record)).await;
                }
                result
            }
        }
    }
}

#[async_trait]
impl Fetch for Dispatcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let transport = self.transport_for(request.uri())?;
        transport.fetch(request).await
    }
}

/// Run an audit write on the blocking pool so file I/O stays off the
/// async workers.
pub(crate) async fn write_audit<F>(audit: Arc<AuditRegistry>, write: F)
where
    F: FnOnce(&AuditRegistry) + Send + 'static,
{
    if let Err(e) = tokio::task::spawn_blocking(move || write(&audit)).await {
        warn!(error = %e, "audit write task failed");
    }
}

/// `host:port` of the origin, IPv6 hosts bracketed.
fn origin_addr(uri: &Uri, default_port: u16) -> Result<String, FetchError> {
    let host = uri
        .host()
        .ok_or_else(|| FetchError::InvalidRequest(format!("URI has no host: {uri}")))?;
    let port = uri.port_u16().unwrap_or(default_port);
    if host.contains(':') && !host.starts_with('[') {
        Ok(format!("[{host}]:{port}"))
    } else {
        Ok(format!("{host}:{port}"))
    }
}

/// Host used for SNI and certificate name checks.
fn server_name(uri: &Uri) -> Result<String, FetchError> {
    let host = uri
        .host()
        .ok_or_else(|| FetchError::InvalidRequest(format!("URI has no host: {uri}")))?;
    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

#[cfg(test)]
mod tests {
    use warden_audit::AccessRecord;

    use super::*;

    #[test]
    fn origin_addresses() {
        let uri: Uri = "http://example.com/a".parse().unwrap();
        assert_eq!(origin_addr(&uri, 80).unwrap(), "example.com:80");
        let uri: Uri = "https://example.com:8443/".parse().unwrap();
        assert_eq!(origin_addr(&uri, 443).unwrap(), "example.com:8443");
        let uri: Uri = "https://[2001:db8::1]/".parse().unwrap();
        assert_eq!(origin_addr(&uri, 443).unwrap(), "[2001:db8::1]:443");
        assert_eq!(server_name(&uri).unwrap(), "2001:db8::1");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_tls_dial_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let tls_log = dir.path().join("tls.log");
        let audit = Arc::new(AuditRegistry::open(dir.path().join("access.log"), &tls_log));
        let dispatcher = Dispatcher::from_config(&TransportConfig::default())
            .unwrap()
            .with_audit(audit);

        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap().to_string();
        drop(closed);

        let redial = dispatcher.tls_redial(addr.clone(), "closed.test".into());
        assert!(redial.redial().await.is_err());

        let logged = std::fs::read_to_string(&tls_log).unwrap();
        let row: Vec<String> = serde_json::from_str(logged.lines().next().unwrap()).unwrap();
        assert_eq!(row[2], "closed.test");
        assert_eq!(row[3], addr);
        assert!(!row[4].is_empty());
    }

    #[tokio::test]
    async fn audit_write_runs_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let access_log = dir.path().join("access.log");
        let audit = Arc::new(AuditRegistry::open(&access_log, dir.path().join("tls.log")));

        let caller = std::thread::current().id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        write_audit(audit, move |audit| {
            audit.log_access(&AccessRecord {
                url: "http://example.com/".into(),
                ..Default::default()
            });
            let _ = tx.send(std::thread::current().id());
        })
        .await;

        assert_ne!(rx.await.unwrap(), caller);
        assert!(std::fs::read_to_string(&access_log).unwrap().contains("http://example.com/"));
    }

    #[test]
    fn unsupported_scheme() {
        let dispatcher = Dispatcher::from_config(&TransportConfig::default()).unwrap();
        let uri: Uri = "gopher://example.com/".parse().unwrap();
        assert!(matches!(
            dispatcher.transport_for(&uri),
            Err(FetchError::InvalidRequest(_))
        ));
        let uri: Uri = "/relative".parse().unwrap();
        assert!(dispatcher.transport_for(&uri).is_err());
    }

    #[test]
    fn missing_extra_roots_file_fails() {
        let config = TransportConfig {
            extra_root_certs: Some("/nonexistent/warden/roots.pem".into()),
            ..Default::default()
        };
        assert!(matches!(
            Dispatcher::from_config(&config),
            Err(FetchError::Config(_))
        ));
    }
}
