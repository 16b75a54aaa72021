//! Plain TCP connector.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;
use warden_core::defaults::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TCP_KEEPALIVE_SECS, DEFAULT_TCP_NO_DELAY,
};

use crate::Connector;
use crate::conn::{Redial, redialer};
use crate::error::FetchError;

/// Connects `host:port` addresses over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    keepalive: Option<Duration>,
    nodelay: bool,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            keepalive: keepalive_from_secs(DEFAULT_TCP_KEEPALIVE_SECS),
            nodelay: DEFAULT_TCP_NO_DELAY,
        }
    }
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Keepalive idle time in seconds; 0 disables keepalive.
    pub fn with_keepalive_secs(mut self, secs: u64) -> Self {
        self.keepalive = keepalive_from_secs(secs);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Open a TCP connection and apply socket options.
    pub async fn dial(&self, addr: &str) -> Result<TcpStream, FetchError> {
        debug!(addr, "connecting");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FetchError::Timeout("connect"))??;
        self.apply_options(&stream)?;
        Ok(stream)
    }

    fn apply_options(&self, stream: &TcpStream) -> Result<(), FetchError> {
        stream.set_nodelay(self.nodelay)?;
        if let Some(idle) = self.keepalive {
            let sock = socket2::SockRef::from(stream);
            sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(idle))?;
        }
        Ok(())
    }

    /// A [`Redial`] that connects `addr` again with this connector's settings.
    pub fn redialer(self: &Arc<Self>, addr: String) -> impl Redial<TcpStream> + use<> {
        redialer(Arc::clone(self), addr)
    }
}

fn keepalive_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(
        &self,
        addr: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TcpStream, FetchError>> + Send + '_>> {
        let addr = addr.to_string();
        Box::pin(async move { self.dial(&addr).await })
    }
}
