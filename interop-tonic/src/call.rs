//! Per-call server object.
//!
//! [`channel`] splits one RPC invocation into two halves:
//!
//! - [`ServerCall`] is what a handler sees: the inbound metadata, a one-shot
//!   header send, and a [`CallWriter`] for response messages and the single
//!   terminal signal (finish with trailers, or fail with a status).
//! - [`CallReceiver`] is what the transport glue sees: the settled headers,
//!   the outbound message stream, and the [`TrailerSlot`] a successful finish
//!   leaves its trailing metadata in.
//!
//! The writer is shared and cheap to clone so queued actions can own one.
//! Once a call is terminated every clone refuses further writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tonic::metadata::MetadataMap;
use tonic::{Response, Status};

use crate::echo;
use crate::error::CallError;
use crate::stream::OutboundStream;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trailing metadata left by a successfully finished call.
#[derive(Debug, Clone, Default)]
pub struct TrailerSlot(Arc<Mutex<Option<MetadataMap>>>);

impl TrailerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, trailers: MetadataMap) {
        *lock(&self.0) = Some(trailers);
    }

    pub fn take(&self) -> Option<MetadataMap> {
        lock(&self.0).take()
    }

    pub fn get(&self) -> Option<MetadataMap> {
        lock(&self.0).clone()
    }
}

type SharedSender<M> = Arc<Mutex<Option<mpsc::UnboundedSender<Result<M, Status>>>>>;

/// Response side of a call.
pub struct CallWriter<M> {
    inner: SharedSender<M>,
    trailers: TrailerSlot,
    peer: watch::Receiver<()>,
}

impl<M> Clone for CallWriter<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            trailers: self.trailers.clone(),
            peer: self.peer.clone(),
        }
    }
}

impl<M> std::fmt::Debug for CallWriter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallWriter")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl<M> CallWriter<M> {
    /// Queue one response message.
    pub fn write(&self, message: M) -> Result<(), CallError> {
        let guard = lock(&self.inner);
        let tx = guard.as_ref().ok_or(CallError::AlreadyTerminated)?;
        tx.send(Ok(message)).map_err(|_| CallError::Closed)
    }

    /// Close the call normally, with `trailers` merged into the OK trailers.
    pub fn finish(&self, trailers: MetadataMap) -> Result<(), CallError> {
        let tx = lock(&self.inner)
            .take()
            .ok_or(CallError::AlreadyTerminated)?;
        // The slot must be filled before the stream ends.
        self.trailers.set(trailers);
        drop(tx);
        Ok(())
    }

    /// Terminate the call with `status`. The status metadata becomes the
    /// trailers.
    pub fn fail(&self, status: Status) -> Result<(), CallError> {
        let tx = lock(&self.inner)
            .take()
            .ok_or(CallError::AlreadyTerminated)?;
        tx.send(Err(status)).map_err(|_| CallError::Closed)
    }

    pub fn is_terminated(&self) -> bool {
        lock(&self.inner).is_none()
    }

    /// Resolves once the transport half of the call is gone: the client
    /// disconnected or the response stream was dropped. Writes after that
    /// fail with [`CallError::Closed`].
    pub async fn closed(&self) {
        let mut peer = self.peer.clone();
        while peer.changed().await.is_ok() {}
    }
}

/// Handler half of a call.
#[derive(Debug)]
pub struct ServerCall<M> {
    metadata: MetadataMap,
    headers: Option<oneshot::Sender<MetadataMap>>,
    writer: CallWriter<M>,
}

impl<M> ServerCall<M> {
    /// Send the response headers: the initial echo entry when the client
    /// asked for one, otherwise no custom headers.
    ///
    /// Only the first call has any effect.
    pub fn echo_initial_metadata(&mut self) {
        if let Some(tx) = self.headers.take() {
            let headers = echo::initial_echo(&self.metadata).unwrap_or_default();
            let _ = tx.send(headers);
        }
    }

    /// Trailing metadata every terminal signal of this call must carry.
    pub fn trailing_metadata(&self) -> MetadataMap {
        echo::trailing_echo(&self.metadata)
    }

    /// A writer handle that can be moved into queued actions.
    pub fn writer(&self) -> CallWriter<M> {
        self.writer.clone()
    }

    /// Write `message` and finish with the trailing echo.
    pub fn respond(&mut self, message: M) -> Result<(), CallError> {
        self.echo_initial_metadata();
        self.writer.write(message)?;
        self.writer.finish(self.trailing_metadata())
    }

    /// Terminate with `status` as is.
    pub fn fail(&mut self, status: Status) -> Result<(), CallError> {
        self.echo_initial_metadata();
        self.writer.fail(status)
    }
}

/// Transport half of a call.
#[derive(Debug)]
pub struct CallReceiver<M> {
    pending_headers: Option<oneshot::Receiver<MetadataMap>>,
    headers: MetadataMap,
    stream: OutboundStream<M>,
    trailers: TrailerSlot,
}

impl<M> CallReceiver<M> {
    /// Wait until the handler settles the response headers.
    ///
    /// A handler that drops the call without sending headers yields an empty
    /// map.
    pub async fn headers(&mut self) -> MetadataMap {
        if let Some(rx) = self.pending_headers.take() {
            self.headers = rx.await.unwrap_or_default();
        }
        self.headers.clone()
    }

    /// Next response message, or the terminal error status.
    pub async fn next(&mut self) -> Option<Result<M, Status>> {
        self.stream.next().await
    }

    /// Trailers left by a successful finish, if any.
    pub fn trailers(&self) -> Option<MetadataMap> {
        self.trailers.get()
    }

    /// Collapse the call into a single-message tonic response.
    ///
    /// On failure the response headers travel in the error status, since a
    /// failed unary call is answered with a trailers-only response.
    pub async fn into_unary(mut self) -> Result<Response<M>, Status> {
        let headers = self.headers().await;
        let message = match self.stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(status)) => return Err(echo::with_metadata(status, headers)),
            None => return Err(Status::internal("call closed without a response")),
        };

        match self.stream.next().await {
            None => Ok(with_headers(Response::new(message), headers)),
            Some(Err(status)) => Err(echo::with_metadata(status, headers)),
            Some(Ok(_)) => Err(Status::internal("unary call produced more than one response")),
        }
    }

    /// Turn the call into a streaming tonic response once headers are settled.
    pub async fn into_streaming(mut self) -> Response<OutboundStream<M>> {
        let headers = self.headers().await;
        with_headers(Response::new(self.stream), headers)
    }
}

fn with_headers<T>(mut response: Response<T>, headers: MetadataMap) -> Response<T> {
    *response.metadata_mut() = headers;
    response
}

/// Create both halves of a call carrying inbound `metadata`.
///
/// `trailers` is the slot the transport glue reads when the response body
/// ends.
pub fn channel<M>(metadata: MetadataMap, trailers: TrailerSlot) -> (ServerCall<M>, CallReceiver<M>) {
    let (headers_tx, headers_rx) = oneshot::channel();
    let (tx, rx) = mpsc::unbounded_channel();
    let (attached, peer) = watch::channel(());

    let call = ServerCall {
        metadata,
        headers: Some(headers_tx),
        writer: CallWriter {
            inner: Arc::new(Mutex::new(Some(tx))),
            trailers: trailers.clone(),
            peer,
        },
    };
    let receiver = CallReceiver {
        pending_headers: Some(headers_rx),
        headers: MetadataMap::new(),
        stream: OutboundStream::new(rx, attached),
        trailers,
    };
    (call, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::{ECHO_INITIAL_KEY, ECHO_TRAILING_KEY};
    use tonic::metadata::MetadataValue;
    use tonic::Code;

    fn echo_metadata() -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(ECHO_INITIAL_KEY, MetadataValue::from_static("hello"));
        metadata.insert_bin(ECHO_TRAILING_KEY, MetadataValue::from_bytes(b"\xab\xcd"));
        metadata
    }

    #[tokio::test]
    async fn writes_then_finish_leave_trailers() {
        let slot = TrailerSlot::new();
        let (mut call, mut rx) = channel::<u32>(echo_metadata(), slot.clone());

        call.echo_initial_metadata();
        call.writer().write(1).unwrap();
        call.writer().write(2).unwrap();
        let trailers = call.trailing_metadata();
        call.writer().finish(trailers).unwrap();

        assert_eq!(rx.headers().await.get(ECHO_INITIAL_KEY).unwrap(), "hello");
        assert_eq!(rx.next().await.unwrap().unwrap(), 1);
        assert_eq!(rx.next().await.unwrap().unwrap(), 2);
        assert!(rx.next().await.is_none());
        assert!(rx.trailers().unwrap().get_bin(ECHO_TRAILING_KEY).is_some());
        assert!(slot.take().is_some());
    }

    #[tokio::test]
    async fn only_one_terminal_signal_is_accepted() {
        let (call, mut rx) = channel::<u32>(MetadataMap::new(), TrailerSlot::new());
        let writer = call.writer();

        writer.fail(Status::new(Code::Aborted, "stop")).unwrap();
        assert!(writer.is_terminated());
        assert_eq!(writer.write(1), Err(CallError::AlreadyTerminated));
        assert_eq!(writer.finish(MetadataMap::new()), Err(CallError::AlreadyTerminated));
        assert_eq!(
            writer.fail(Status::internal("again")),
            Err(CallError::AlreadyTerminated)
        );

        assert_eq!(rx.next().await.unwrap().unwrap_err().code(), Code::Aborted);
        assert!(rx.next().await.is_none());
        assert!(rx.trailers().is_none());
    }

    #[tokio::test]
    async fn writing_to_a_dropped_receiver_reports_closed() {
        let (call, rx) = channel::<u32>(MetadataMap::new(), TrailerSlot::new());
        drop(rx);
        assert_eq!(call.writer().write(1), Err(CallError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_resolves_when_the_receiver_goes_away() {
        let (mut call, rx) = channel::<u32>(MetadataMap::new(), TrailerSlot::new());
        call.echo_initial_metadata();
        let writer = call.writer();
        let waiting = tokio::spawn(async move { writer.closed().await });

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(!waiting.is_finished());

        let response = rx.into_streaming().await;
        drop(response);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn headers_are_empty_without_the_echo_key() {
        let (mut call, mut rx) = channel::<u32>(MetadataMap::new(), TrailerSlot::new());
        call.echo_initial_metadata();
        call.echo_initial_metadata();
        assert!(rx.headers().await.is_empty());

        let (call, mut rx) = channel::<u32>(echo_metadata(), TrailerSlot::new());
        drop(call);
        assert!(rx.headers().await.is_empty());
    }

    #[tokio::test]
    async fn unary_success_carries_headers() {
        let (mut call, rx) = channel::<u32>(echo_metadata(), TrailerSlot::new());
        call.respond(9).unwrap();

        let response = rx.into_unary().await.unwrap();
        assert_eq!(response.metadata().get(ECHO_INITIAL_KEY).unwrap(), "hello");
        assert_eq!(response.into_inner(), 9);
    }

    #[tokio::test]
    async fn unary_failure_moves_headers_into_the_status() {
        let (mut call, rx) = channel::<u32>(echo_metadata(), TrailerSlot::new());
        let status = Status::with_metadata(Code::Unknown, "boom", call.trailing_metadata());
        call.fail(status).unwrap();

        let status = rx.into_unary().await.unwrap_err();
        assert_eq!(status.code(), Code::Unknown);
        assert_eq!(status.message(), "boom");
        assert_eq!(status.metadata().get(ECHO_INITIAL_KEY).unwrap(), "hello");
        assert!(status.metadata().get_bin(ECHO_TRAILING_KEY).is_some());
    }

    #[tokio::test]
    async fn unary_without_a_message_is_internal() {
        let (mut call, rx) = channel::<u32>(MetadataMap::new(), TrailerSlot::new());
        call.echo_initial_metadata();
        call.writer().finish(MetadataMap::new()).unwrap();

        assert_eq!(rx.into_unary().await.unwrap_err().code(), Code::Internal);
    }

    #[tokio::test]
    async fn streaming_response_waits_for_headers() {
        let (mut call, rx) = channel::<u32>(echo_metadata(), TrailerSlot::new());
        let handler = tokio::spawn(async move {
            tokio::task::yield_now().await;
            call.echo_initial_metadata();
            call.writer().write(3).unwrap();
            let trailers = call.trailing_metadata();
            call.writer().finish(trailers).unwrap();
        });

        let response = rx.into_streaming().await;
        assert_eq!(response.metadata().get(ECHO_INITIAL_KEY).unwrap(), "hello");
        let mut stream = response.into_inner();
        assert_eq!(stream.next().await.unwrap().unwrap(), 3);
        assert!(stream.next().await.is_none());
        handler.await.unwrap();
    }
}
