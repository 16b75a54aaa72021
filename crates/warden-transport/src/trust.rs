//! TLS dialing with manual chain verification and fallback trust roots.
//!
//! The handshake runs with chain validation deferred; handshake signatures
//! are still checked against the presented leaf key. Once connected, the
//! chain is verified for the server name against the system roots and, if
//! that fails, against the operator's extra roots.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};
use warden_core::defaults::DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS;

use crate::Connector;
use crate::dial::TcpConnector;
use crate::error::FetchError;
use crate::tls_config::system_root_store;

/// Which root pool verified a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSource {
    System,
    Extra,
}

/// Accepts any chain during the handshake; the chain is verified after the
/// handshake by [`TrustVerifier`].
#[derive(Debug)]
struct DeferredVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for DeferredVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// TLS dialer that verifies server chains against two root pools.
#[allow(missing_debug_implementations)]
pub struct TrustVerifier {
    tcp: TcpConnector,
    connector: TlsConnector,
    system: Arc<WebPkiServerVerifier>,
    extra: Option<Arc<WebPkiServerVerifier>>,
    handshake_timeout: Duration,
}

impl TrustVerifier {
    /// Verify against the bundled system roots only.
    pub fn new(tcp: TcpConnector) -> Result<Self, FetchError> {
        Self::with_roots(tcp, system_root_store(), None)
    }

    /// Verify against `system`, then `extra` when given.
    pub fn with_roots(
        tcp: TcpConnector,
        system: RootCertStore,
        extra: Option<RootCertStore>,
    ) -> Result<Self, FetchError> {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

        let system = build_verifier(system, &provider)?;
        let extra = extra
            .map(|roots| build_verifier(roots, &provider))
            .transpose()?;

        let deferred = DeferredVerifier {
            algorithms: provider.signature_verification_algorithms,
        };
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(deferred))
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            tcp,
            connector: TlsConnector::from(Arc::new(config)),
            system,
            extra,
            handshake_timeout: Duration::from_secs(DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS),
        })
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn has_extra_roots(&self) -> bool {
        self.extra.is_some()
    }

    /// Dial `addr`, complete the handshake for `server_name`, and verify the
    /// presented chain.
    ///
    /// When neither pool accepts the chain the connection is shut down and
    /// the system-roots error is returned.
    pub async fn connect_to(
        &self,
        addr: &str,
        server_name: &str,
    ) -> Result<VerifiedTlsStream, FetchError> {
        let name = ServerName::try_from(server_name.to_string()).map_err(|e| {
            FetchError::InvalidRequest(format!("invalid server name {server_name}: {e}"))
        })?;

        let tcp = self.tcp.dial(addr).await?;
        let mut tls = tokio::time::timeout(
            self.handshake_timeout,
            self.connector.connect(name.clone(), tcp),
        )
        .await
        .map_err(|_| FetchError::Timeout("TLS handshake"))??;

        match self.verify(&tls, &name) {
            Ok(trust) => {
                debug!(server_name, ?trust, "certificate chain verified");
                Ok(VerifiedTlsStream { inner: tls, trust })
            }
            Err(e) => {
                warden_metrics::record_tls_verify_failure();
                warn!(server_name, addr, error = %e, "certificate verification failed");
                let _ = tls.shutdown().await;
                Err(FetchError::Tls(e))
            }
        }
    }

    fn verify(
        &self,
        tls: &TlsStream<TcpStream>,
        name: &ServerName<'_>,
    ) -> Result<TrustSource, rustls::Error> {
        let (_, conn) = tls.get_ref();
        let (end_entity, intermediates) = conn
            .peer_certificates()
            .and_then(|certs| certs.split_first())
            .ok_or(rustls::Error::NoCertificatesPresented)?;
        let now = UnixTime::now();

        let system_err = match self
            .system
            .verify_server_cert(end_entity, intermediates, name, &[], now)
        {
            Ok(_) => return Ok(TrustSource::System),
            Err(e) => e,
        };

        if let Some(extra) = &self.extra
            && extra
                .verify_server_cert(end_entity, intermediates, name, &[], now)
                .is_ok()
        {
            warden_metrics::record_tls_extra_root_verified();
            return Ok(TrustSource::Extra);
        }
        Err(system_err)
    }
}

fn build_verifier(
    roots: RootCertStore,
    provider: &Arc<CryptoProvider>,
) -> Result<Arc<WebPkiServerVerifier>, FetchError> {
    WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(provider))
        .build()
        .map_err(|e| FetchError::Config(format!("failed to build certificate verifier: {e}")))
}

impl Connector for TrustVerifier {
    type Stream = VerifiedTlsStream;

    fn connect(
        &self,
        addr: &str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedTlsStream, FetchError>> + Send + '_>> {
        let addr = addr.to_string();
        Box::pin(async move {
            let host = extract_host(&addr);
            self.connect_to(&addr, &host).await
        })
    }
}

/// Host part of a `host:port` address, without IPv6 brackets.
fn extract_host(addr: &str) -> String {
    if let Some(stripped) = addr.strip_prefix('[')
        && let Some(end) = stripped.find(']')
    {
        return stripped[..end].to_string();
    }
    if addr.matches(':').count() == 1
        && let Some((host, _)) = addr.rsplit_once(':')
    {
        return host.to_string();
    }
    addr.to_string()
}

/// A TLS stream whose chain has been verified.
#[derive(Debug)]
pub struct VerifiedTlsStream {
    inner: TlsStream<TcpStream>,
    trust: TrustSource,
}

impl VerifiedTlsStream {
    /// The pool that verified the chain.
    pub fn trust(&self) -> TrustSource {
        self.trust
    }

    /// The verified chain, leaf first.
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.inner.get_ref().1.peer_certificates()
    }
}

impl AsyncRead for VerifiedTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for VerifiedTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}
