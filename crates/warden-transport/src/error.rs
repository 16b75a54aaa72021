//! Error types for the transport crate.

use std::error::Error as StdError;
use std::io;

use rustls::AlertDescription;
use thiserror::Error;

/// Boxed error used for request body streams.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors that can occur while fetching.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("request canceled")]
    Canceled,

    #[error("request body was already consumed")]
    BodyConsumed,

    #[error("request body error: {0}")]
    Body(BoxError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("FTP error {code}: {message}")]
    Ftp { code: u16, message: String },

    #[error("FTP protocol error: {0}")]
    FtpProtocol(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("no redial function provided")]
    NoRedial,
}

impl FetchError {
    /// Whether the error means the connection died under the request, so a
    /// replayable request may be sent again on a fresh connection.
    ///
    /// Covers a peer closing before or while the response was read,
    /// unexpected end of input, broken pipe, connection reset, and a TLS
    /// `no_renegotiation` alert.
    pub fn is_redial_worthy(&self) -> bool {
        match self {
            FetchError::Io(e) => io_is_redial_worthy(e),
            FetchError::Http(e) => {
                e.is_incomplete_message()
                    || e.is_closed()
                    || e.is_canceled()
                    || source_chain_is_redial_worthy(e)
            }
            FetchError::Tls(e) => tls_is_redial_worthy(e),
            _ => false,
        }
    }

    /// Error type label for metrics and logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            FetchError::Io(e) if e.kind() == io::ErrorKind::TimedOut => warden_core::ERROR_TIMEOUT,
            FetchError::Io(_) => warden_core::ERROR_IO,
            FetchError::Http(_) | FetchError::Body(_) => warden_core::ERROR_HTTP,
            FetchError::Tls(_) => warden_core::ERROR_TLS,
            FetchError::Canceled => warden_core::ERROR_CANCELED,
            FetchError::BodyConsumed | FetchError::InvalidRequest(_) => warden_core::ERROR_REQUEST,
            FetchError::Config(_) => warden_core::ERROR_CONFIG,
            FetchError::Ftp { .. } | FetchError::FtpProtocol(_) => warden_core::ERROR_FTP,
            FetchError::Timeout(_) => warden_core::ERROR_TIMEOUT,
            FetchError::NoRedial => warden_core::ERROR_CONNECT,
        }
    }
}

fn io_is_redial_worthy(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => true,
        _ => e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            .is_some_and(tls_is_redial_worthy),
    }
}

fn tls_is_redial_worthy(e: &rustls::Error) -> bool {
    matches!(
        e,
        rustls::Error::AlertReceived(AlertDescription::NoRenegotiation)
    )
}

fn source_chain_is_redial_worthy(e: &(dyn StdError + 'static)) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<io::Error>()
            && io_is_redial_worthy(io)
        {
            return true;
        }
        if let Some(tls) = err.downcast_ref::<rustls::Error>()
            && tls_is_redial_worthy(tls)
        {
            return true;
        }
        source = err.source();
    }
    false
}
