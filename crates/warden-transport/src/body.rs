//! Response bodies: cancellation-aware wrapping and a streaming pipe.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::FetchError;

/// Body type of every [`FetchResponse`](crate::FetchResponse).
pub type ResponseBody = UnsyncBoxBody<Bytes, FetchError>;

/// Body wrapper that fails with [`FetchError::Canceled`] once the token
/// fires, including while a read is blocked.
pub struct CancellableBody<B> {
    inner: B,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<B> CancellableBody<B> {
    pub fn new(inner: B, token: CancellationToken) -> Self {
        Self {
            inner,
            cancelled: Box::pin(token.cancelled_owned()),
        }
    }
}

impl<B> Body for CancellableBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<FetchError>,
{
    type Data = Bytes;
    type Error = FetchError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, FetchError>>> {
        let this = &mut *self;
        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Some(Err(FetchError::Canceled)));
        }
        Pin::new(&mut this.inner).poll_frame(cx).map_err(Into::into)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Create a bounded pipe: bytes sent through the writer are read from the
/// body in order. Dropping the writer ends the body cleanly; [`PipeWriter::fail`]
/// ends it with an error instead.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeBody) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PipeWriter { tx }, PipeBody { rx })
}

/// Producer half of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<Result<Bytes, FetchError>>,
}

impl PipeWriter {
    /// Send a chunk, waiting for buffer space. Fails once the reader is gone.
    pub async fn send(&self, chunk: Bytes) -> Result<(), FetchError> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| FetchError::Canceled)
    }

    /// Close the pipe with an error the reader will observe.
    pub async fn fail(self, err: FetchError) {
        let _ = self.tx.send(Err(err)).await;
    }

    /// Resolves when the reader has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a [`pipe`].
#[derive(Debug)]
pub struct PipeBody {
    rx: mpsc::Receiver<Result<Bytes, FetchError>>,
}

impl Body for PipeBody {
    type Data = Bytes;
    type Error = FetchError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, FetchError>>> {
        let item = ready!(self.rx.poll_recv(cx));
        Poll::Ready(item.map(|chunk| chunk.map(Frame::data)))
    }
}

pub fn empty_body() -> ResponseBody {
    Empty::new().map_err(|never| match never {}).boxed_unsync()
}

pub fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Read a body to the end.
pub async fn collect_body(body: ResponseBody) -> Result<Bytes, FetchError> {
    Ok(body.collect().await?.to_bytes())
}
