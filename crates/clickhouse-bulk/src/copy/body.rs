//! Bounded producer/consumer pipe for insert bodies.
//!
//! [`body_channel`] returns a writable [`ChannelSink`] for the encoder side
//! and a [`BodyStream`] of byte chunks for the transport side. The channel
//! capacity bounds memory: the producer waits while the channel is full and
//! the transport waits while it is empty. A producer failure arrives as the
//! stream's final item.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::PollSender;

use crate::error::{Error, Result};

type Chunk = Result<Bytes>;

/// Create a pipe holding at most `capacity` chunks (minimum 1).
pub fn body_channel(capacity: usize) -> (ChannelSink, BodyStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelSink {
            tx: PollSender::new(tx),
        },
        BodyStream {
            inner: ReceiverStream::new(rx),
            failed: false,
        },
    )
}

fn receiver_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "body stream was dropped")
}

/// Writing half of a [`body_channel`].
///
/// Every write becomes one chunk. Shutting the sink down ends the stream
/// once all [`FailureHandle`]s are gone as well.
pub struct ChannelSink {
    tx: PollSender<Chunk>,
}

impl fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSink")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl ChannelSink {
    /// Handle for reporting a failure after the sink itself is gone.
    pub fn failure_handle(&self) -> FailureHandle {
        FailureHandle {
            tx: self.tx.get_ref().cloned(),
        }
    }
}

impl AsyncWrite for ChannelSink {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        ready!(this.tx.poll_reserve(cx)).map_err(|_| receiver_gone())?;
        this.tx
            .send_item(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| receiver_gone())?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().tx.close();
        Poll::Ready(Ok(()))
    }
}

/// Sends a producer error to the [`BodyStream`].
#[derive(Debug)]
pub struct FailureHandle {
    tx: Option<mpsc::Sender<Chunk>>,
}

impl FailureHandle {
    /// Deliver `err` as the stream's final item.
    ///
    /// Does nothing if the stream was already dropped.
    pub async fn fail(self, err: Error) {
        if let Some(tx) = self.tx
            && tx.send(Err(err)).await.is_err()
        {
            tracing::debug!(
                target: crate::observability::TARGET,
                "body stream dropped before the failure was delivered"
            );
        }
    }
}

/// Reading half of a [`body_channel`]: chunks of the insert body.
///
/// Ends after the first error.
#[derive(Debug)]
pub struct BodyStream {
    inner: ReceiverStream<Chunk>,
    failed: bool,
}

impl Stream for BodyStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }
        let item = ready!(Pin::new(&mut self.inner).poll_next(cx));
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        Poll::Ready(item)
    }
}
