//! Outgoing request model.

use bytes::Bytes;
use http::header::{HOST, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri, Version};
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, FetchError};

/// Body type written to the wire.
pub type OutgoingBody = UnsyncBoxBody<Bytes, BoxError>;

const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");
const X_IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("x-idempotency-key");

/// Request body.
///
/// `Empty` and `Full` can be sent any number of times. A `Streaming` body
/// can be sent once; sending it again fails with
/// [`FetchError::BodyConsumed`].
pub enum RequestBody {
    Empty,
    Full(Bytes),
    Streaming(Mutex<Option<OutgoingBody>>),
}

impl RequestBody {
    /// Whether the body can be reproduced for a second attempt.
    pub fn is_reproducible(&self) -> bool {
        matches!(self, RequestBody::Empty | RequestBody::Full(_))
    }

    fn to_outgoing(&self) -> Result<OutgoingBody, FetchError> {
        match self {
            RequestBody::Empty => Ok(Empty::new().map_err(|never| match never {}).boxed_unsync()),
            RequestBody::Full(bytes) => Ok(Full::new(bytes.clone())
                .map_err(|never| match never {})
                .boxed_unsync()),
            RequestBody::Streaming(slot) => slot.lock().take().ok_or(FetchError::BodyConsumed),
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            RequestBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

/// A request handed to a [`Fetch`](crate::Fetch) implementation.
///
/// Transports take the request by reference so that retrying wrappers can
/// send it again. Every request carries a cancellation token observed by
/// connect, write, read and redial.
#[derive(Debug)]
pub struct FetchRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: RequestBody,
    cancel: CancellationToken,
}

impl FetchRequest {
    /// Create a request with an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a GET request.
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Parse `uri` and create a request.
    pub fn parse(method: Method, uri: &str) -> Result<Self, FetchError> {
        let uri: Uri = uri
            .parse()
            .map_err(|e| FetchError::InvalidRequest(format!("invalid URI {uri}: {e}")))?;
        Ok(Self::new(method, uri))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attach an in-memory (replayable) body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Full(body.into());
        self
    }

    /// Attach a streaming body. Such a request is never replayed.
    pub fn with_streaming_body<B>(mut self, body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let body = body.map_err(Into::into).boxed_unsync();
        self.body = RequestBody::Streaming(Mutex::new(Some(body)));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// The request's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the request may be sent again after a connection failure.
    ///
    /// The body must be reproducible, and the method must be free of side
    /// effects (GET, HEAD, OPTIONS, TRACE) or the request must carry a
    /// non-empty `Idempotency-Key` or `X-Idempotency-Key` header.
    pub fn is_replayable(&self) -> bool {
        if !self.body.is_reproducible() {
            return false;
        }
        if matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        ) {
            return true;
        }
        [IDEMPOTENCY_KEY, X_IDEMPOTENCY_KEY]
            .iter()
            .any(|name| self.headers.get(name).is_some_and(|v| !v.is_empty()))
    }

    /// Build the wire request: origin-form target and a `Host` header.
    pub(crate) fn to_http(&self) -> Result<http::Request<OutgoingBody>, FetchError> {
        let target = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/");
        let target: Uri = target
            .parse()
            .map_err(|e| FetchError::InvalidRequest(format!("invalid request target: {e}")))?;

        let mut headers = self.headers.clone();
        if !headers.contains_key(HOST) {
            let host = host_header(&self.uri)?;
            headers.insert(HOST, host);
        }

        let mut request = http::Request::builder()
            .method(self.method.clone())
            .uri(target)
            .version(self.version)
            .body(self.body.to_outgoing()?)
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

fn host_header(uri: &Uri) -> Result<HeaderValue, FetchError> {
    let host = uri
        .host()
        .ok_or_else(|| FetchError::InvalidRequest(format!("URI has no host: {uri}")))?;
    let value = match uri.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|e| FetchError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(method: Method) -> FetchRequest {
        FetchRequest::new(method, Uri::from_static("http://example.com:8080/a?b=c"))
    }

    #[test]
    fn replayability() {
        assert!(req(Method::GET).is_replayable());
        assert!(req(Method::HEAD).is_replayable());
        assert!(req(Method::OPTIONS).is_replayable());
        assert!(req(Method::TRACE).is_replayable());
        assert!(!req(Method::POST).is_replayable());
        assert!(!req(Method::PUT).is_replayable());
        assert!(!req(Method::POST).with_body("form").is_replayable());
    }

    #[test]
    fn idempotency_key_makes_post_replayable() {
        let r = req(Method::POST)
            .with_body("data")
            .with_header(IDEMPOTENCY_KEY, HeaderValue::from_static("k1"));
        assert!(r.is_replayable());

        let r = req(Method::POST).with_header(X_IDEMPOTENCY_KEY, HeaderValue::from_static("k2"));
        assert!(r.is_replayable());

        let r = req(Method::POST).with_header(IDEMPOTENCY_KEY, HeaderValue::from_static(""));
        assert!(!r.is_replayable());
    }

    #[test]
    fn streaming_body_is_not_replayable() {
        let r = req(Method::GET).with_streaming_body(Full::new(Bytes::from_static(b"x")));
        assert!(!r.is_replayable());
        assert!(r.to_http().is_ok());
        assert!(matches!(r.to_http(), Err(FetchError::BodyConsumed)));
    }

    #[test]
    fn wire_form() {
        let http = req(Method::GET).to_http().unwrap();
        assert_eq!(http.uri(), "/a?b=c");
        assert_eq!(http.headers()[HOST], "example.com:8080");

        let r = FetchRequest::get(Uri::from_static("http://example.com"))
            .with_header(HOST, HeaderValue::from_static("override"));
        let http = r.to_http().unwrap();
        assert_eq!(http.uri(), "/");
        assert_eq!(http.headers()[HOST], "override");
    }
}
