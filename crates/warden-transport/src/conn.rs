//! Single persistent HTTP/1.1 connection with redial.
//!
//! A [`ConnTransport`] owns one session at a time. The session is taken out
//! of its slot for the duration of an exchange, so no lock is held across
//! network I/O. When the connection dies under a replayable request the
//! transport dials a replacement once and sends the request again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::body::CancellableBody;
use crate::error::FetchError;
use crate::request::{FetchRequest, OutgoingBody};
use crate::{Connector, Fetch, FetchResponse, TransportStream};

/// Produces a fresh stream to replace a dead connection.
pub trait Redial<S>: Send + Sync {
    fn redial(&self) -> Pin<Box<dyn Future<Output = Result<S, FetchError>> + Send + '_>>;
}

impl<S, F, Fut> Redial<S> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<S, FetchError>> + Send + 'static,
{
    fn redial(&self) -> Pin<Box<dyn Future<Output = Result<S, FetchError>> + Send + '_>> {
        Box::pin(self())
    }
}

/// Redial by connecting `addr` again through `connector`.
pub fn redialer<C: Connector>(
    connector: Arc<C>,
    addr: String,
) -> impl Redial<C::Stream> + use<C> {
    move || {
        let connector = Arc::clone(&connector);
        let addr = addr.clone();
        async move { connector.connect(&addr).await }
    }
}

struct Session {
    sender: SendRequest<OutgoingBody>,
    used: bool,
}

impl Session {
    async fn handshake<S: TransportStream>(stream: S) -> Result<Self, FetchError> {
        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });
        Ok(Self {
            sender,
            used: false,
        })
    }

    async fn exchange(&mut self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let cancel = request.cancellation();
        if cancel.is_cancelled() {
            return Err(FetchError::Canceled);
        }
        let wire = request.to_http()?;
        self.used = true;

        let sender = &mut self.sender;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Canceled),
            r = async {
                sender.ready().await?;
                sender.send_request(wire).await
            } => r?,
        };

        let token = cancel.clone();
        Ok(response.map(|body| CancellableBody::new(body, token).boxed_unsync()))
    }
}

/// Round-tripper over one connection at a time.
///
/// Meant to be driven by one logical client: calls should not overlap.
pub struct ConnTransport<S> {
    session: Mutex<Option<Session>>,
    redial: Option<Box<dyn Redial<S>>>,
}

impl<S: TransportStream> ConnTransport<S> {
    /// Run HTTP/1.1 over an established stream, with no redial.
    pub async fn new(stream: S) -> Result<Self, FetchError> {
        let session = Session::handshake(stream).await?;
        Ok(Self {
            session: Mutex::new(Some(session)),
            redial: None,
        })
    }

    /// Create a transport that dials on first use.
    pub fn lazy(redial: impl Redial<S> + 'static) -> Self {
        Self {
            session: Mutex::new(None),
            redial: Some(Box::new(redial)),
        }
    }

    /// Set the function used to replace a dead connection.
    pub fn with_redial(mut self, redial: impl Redial<S> + 'static) -> Self {
        self.redial = Some(Box::new(redial));
        self
    }

    async fn redial(&self, request: &FetchRequest, kind: &'static str) -> Result<Session, FetchError> {
        let redial = self.redial.as_ref().ok_or(FetchError::NoRedial)?;
        let result = tokio::select! {
            biased;
            _ = request.cancellation().cancelled() => Err(FetchError::Canceled),
            r = async {
                let stream = redial.redial().await?;
                Session::handshake(stream).await
            } => r,
        };
        warden_metrics::record_redial(kind, result.is_ok());
        result
    }
}

#[async_trait]
impl<S: TransportStream> Fetch for ConnTransport<S> {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if request.is_canceled() {
            return Err(FetchError::Canceled);
        }
        let replayable = request.is_replayable();
        let mut session = self.session.lock().take();

        // A reused connection may have gone stale, and a request that cannot
        // be replayed gets no second chance; start it on a fresh connection.
        if self.redial.is_some() && !replayable && session.as_ref().is_some_and(|s| s.used) {
            match self.redial(request, "proactive").await {
                Ok(fresh) => session = Some(fresh),
                Err(FetchError::Canceled) => {
                    *self.session.lock() = session;
                    return Err(FetchError::Canceled);
                }
                Err(e) => debug!(error = %e, "proactive redial failed, reusing connection"),
            }
        }

        let mut session = match session {
            Some(session) => session,
            None => self.redial(request, "initial").await?,
        };

        let result = match session.exchange(request).await {
            Err(e) if replayable && e.is_redial_worthy() => {
                debug!(error = %e, uri = %request.uri(), "connection lost, redialing");
                match self.redial(request, "reactive").await {
                    Ok(fresh) => {
                        session = fresh;
                        session.exchange(request).await
                    }
                    Err(FetchError::Canceled) => Err(FetchError::Canceled),
                    Err(redial_err) => {
                        warn!(error = %e, redial_error = %redial_err, "redial failed");
                        Err(e)
                    }
                }
            }
            other => other,
        };

        *self.session.lock() = Some(session);
        result
    }
}
