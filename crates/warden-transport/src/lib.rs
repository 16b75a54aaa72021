//! Resilient fetching for warden.
//!
//! Every transport implements the single [`Fetch`] capability, so wrappers
//! compose by decoration: a [`RetryTransport`] around a [`ConnTransport`]
//! running over a plain TCP stream or a [`VerifiedTlsStream`], or an
//! [`FtpBridge`] for `ftp://` URLs.
//!
//! # Transports
//!
//! - [`conn`]: one persistent HTTP/1.1 connection with redial.
//! - [`retry`]: bounded retries for replayable requests.
//! - [`trust`]: TLS dialing with manual chain verification and fallback roots.
//! - [`ftp`]: FTP downloads exposed as streaming HTTP-shaped responses.
//! - [`dial`]: TCP connector with timeouts and keepalive.

pub mod body;
pub mod conn;
pub mod dial;
pub mod error;
pub mod ftp;
pub mod request;
pub mod retry;
pub mod tls_config;
pub mod trust;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub use body::ResponseBody;
pub use conn::{ConnTransport, Redial, redialer};
pub use dial::TcpConnector;
pub use error::FetchError;
pub use ftp::FtpBridge;
pub use request::{FetchRequest, RequestBody};
pub use retry::RetryTransport;
pub use trust::{TrustSource, TrustVerifier, VerifiedTlsStream};

/// Response returned by every transport.
pub type FetchResponse = http::Response<ResponseBody>;

/// Marker trait for streams an HTTP connection can run over.
pub trait TransportStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> TransportStream for T {}

/// The fetch capability: turn a request into a response or an error.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    #[inline]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Box<F> {
    #[inline]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        (**self).fetch(request).await
    }
}

/// Connects outbound to a `host:port` address, producing a stream.
pub trait Connector: Send + Sync + 'static {
    /// The stream type produced by this connector.
    type Stream: TransportStream;

    /// Connect to the given `host:port` address.
    fn connect(
        &self,
        addr: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream, FetchError>> + Send + '_>>;
}
