//! FTP downloads exposed as streaming HTTP-shaped responses.

mod client;

use async_trait::async_trait;
use bytes::BytesMut;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use percent_encoding::percent_decode_str;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warden_core::defaults::{
    DEFAULT_FTP_PASSWORD, DEFAULT_FTP_PIPE_CAPACITY, DEFAULT_FTP_PORT, DEFAULT_FTP_READ_BUFFER,
    DEFAULT_FTP_USER,
};

use crate::body::{PipeWriter, empty_body, pipe};
use crate::dial::TcpConnector;
use crate::error::FetchError;
use crate::request::FetchRequest;
use crate::{Fetch, FetchResponse};

use client::FtpControl;

/// Fetches `ftp://` URLs.
///
/// A GET returns a 200 response at once; its body streams the file while
/// the transfer runs in a background task. Any other method gets a
/// synthetic 405 response.
#[derive(Debug, Clone)]
pub struct FtpBridge {
    tcp: TcpConnector,
    user: String,
    password: String,
    pipe_capacity: usize,
}

impl Default for FtpBridge {
    fn default() -> Self {
        Self::new(TcpConnector::default())
    }
}

impl FtpBridge {
    pub fn new(tcp: TcpConnector) -> Self {
        Self {
            tcp,
            user: DEFAULT_FTP_USER.to_string(),
            password: DEFAULT_FTP_PASSWORD.to_string(),
            pipe_capacity: DEFAULT_FTP_PIPE_CAPACITY,
        }
    }

    /// Credentials used when the URL carries none.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }
}

/// What to download and how to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    addr: String,
    path: String,
    user: String,
    password: String,
}

impl Target {
    fn from_uri(uri: &Uri, default_user: &str, default_password: &str) -> Result<Self, FetchError> {
        let authority = uri
            .authority()
            .ok_or_else(|| FetchError::InvalidRequest(format!("FTP URL has no host: {uri}")))?;
        let port = authority.port_u16().unwrap_or(DEFAULT_FTP_PORT);
        let addr = format!("{}:{port}", authority.host());

        let (user, password) = match authority.as_str().rsplit_once('@') {
            Some((userinfo, _)) => {
                let (user, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
                (decode(user), decode(password))
            }
            None => (default_user.to_string(), default_password.to_string()),
        };

        let path = decode(uri.path());
        let path = path.strip_prefix('/').unwrap_or(&path).to_string();
        if path.is_empty() {
            return Err(FetchError::InvalidRequest(format!("FTP URL has no file path: {uri}")));
        }

        for (what, value) in [("path", &path), ("user", &user), ("password", &password)] {
            if has_line_break(value) {
                return Err(FetchError::InvalidRequest(format!(
                    "FTP {what} contains a control character"
                )));
            }
        }

        Ok(Self {
            addr,
            path,
            user,
            password,
        })
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// CR, LF and NUL would end a control-connection command early.
pub(crate) fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n', '\0'])
}

#[async_trait]
impl Fetch for FtpBridge {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if request.method() != Method::GET {
            return Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(empty_body())
                .map_err(|e| FetchError::InvalidRequest(e.to_string()));
        }
        if request.is_canceled() {
            return Err(FetchError::Canceled);
        }

        let target = Target::from_uri(request.uri(), &self.user, &self.password)?;
        let content_type = mime_guess::from_path(&target.path)
            .first()
            .and_then(|mime| HeaderValue::from_str(mime.as_ref()).ok());

        let (writer, body) = pipe(self.pipe_capacity);
        tokio::spawn(run_download(
            self.tcp.clone(),
            target,
            writer,
            request.cancellation().clone(),
            request.uri().to_string(),
        ));

        let mut response = Response::builder().status(StatusCode::OK);
        if let Some(content_type) = content_type {
            response = response.header(CONTENT_TYPE, content_type);
        }
        response
            .body(body.boxed_unsync())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))
    }
}

/// Drive one transfer into the pipe. Stops when the reader goes away or the
/// request is canceled; a transfer error ends the pipe with that error.
async fn run_download(
    tcp: TcpConnector,
    target: Target,
    writer: PipeWriter,
    cancel: CancellationToken,
    url: String,
) {
    let result = tokio::select! {
        r = download(&tcp, &target, &writer) => r,
        _ = writer.closed() => {
            debug!(url, "reader dropped, abandoning FTP download");
            return;
        }
        _ = cancel.cancelled() => Err(FetchError::Canceled),
    };

    match result {
        Ok(()) => debug!(url, "FTP download complete"),
        Err(e) => {
            warn!(url, error = %e, "error downloading over FTP");
            warden_metrics::record_fetch_error(e.error_type());
            writer.fail(e).await;
        }
    }
}

async fn download(tcp: &TcpConnector, target: &Target, writer: &PipeWriter) -> Result<(), FetchError> {
    let mut control = FtpControl::connect(tcp, &target.addr).await?;
    control.login(&target.user, &target.password).await?;
    control.binary().await?;
    let mut data = control.open_data(tcp).await?;
    control.retrieve(&target.path).await?;

    let mut buf = BytesMut::with_capacity(DEFAULT_FTP_READ_BUFFER);
    loop {
        buf.reserve(DEFAULT_FTP_READ_BUFFER);
        if data.read_buf(&mut buf).await? == 0 {
            break;
        }
        writer.send(buf.split().freeze()).await?;
    }
    drop(data);

    control.finish_transfer().await?;
    control.quit().await;
    Ok(())
}
