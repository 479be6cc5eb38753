use std::pin::Pin;
use std::task::{ready, Context, Poll};

use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;

use crate::call::TrailerSlot;

/// Response body that merges a call's trailing metadata into the trailers
/// frame produced by the gRPC encoder.
///
/// The encoder writes `grpc-status` into the trailers of a successful call;
/// whatever the handler left in the [`TrailerSlot`] is added next to it.
/// Bodies that end without a trailers frame pass through untouched.
#[pin_project]
#[derive(Debug)]
pub struct TrailerBody<B> {
    #[pin]
    inner: B,
    trailers: TrailerSlot,
}

impl<B> TrailerBody<B> {
    pub fn new(inner: B, trailers: TrailerSlot) -> Self {
        Self { inner, trailers }
    }
}

impl<B: Body> Body for TrailerBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = match ready!(this.inner.poll_frame(cx)) {
            Some(Ok(frame)) => frame,
            other => return Poll::Ready(other),
        };

        match frame.into_trailers() {
            Ok(mut trailers) => {
                if let Some(extra) = this.trailers.take() {
                    trailers.extend(extra.into_headers());
                }
                Poll::Ready(Some(Ok(Frame::trailers(trailers))))
            }
            Err(frame) => Poll::Ready(Some(Ok(frame))),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
