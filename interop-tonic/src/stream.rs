use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tonic::Status;

/// Outbound half of a call's response stream.
///
/// Yields every message the handler wrote, then the terminating status if the
/// call failed, then `None` once the call is closed. This is the stream tonic
/// encodes onto the wire for streaming responses.
///
/// Dropping the stream, which tonic does when the client goes away, is what
/// [`CallWriter::closed`](crate::CallWriter::closed) waits for.
#[derive(Debug)]
pub struct OutboundStream<M> {
    inner: mpsc::UnboundedReceiver<Result<M, Status>>,
    _attached: watch::Sender<()>,
}

impl<M> OutboundStream<M> {
    pub(crate) fn new(
        inner: mpsc::UnboundedReceiver<Result<M, Status>>,
        attached: watch::Sender<()>,
    ) -> Self {
        Self {
            inner,
            _attached: attached,
        }
    }

    /// Receive the next item.
    ///
    /// Returns `None` when the call has been closed or every writer dropped.
    pub async fn next(&mut self) -> Option<Result<M, Status>> {
        self.inner.recv().await
    }
}

impl<M> Stream for OutboundStream<M> {
    type Item = Result<M, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_recv(cx)
    }
}
