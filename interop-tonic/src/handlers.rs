//! `TestService` call handlers.
//!
//! Every handler echoes the response headers first and ends the call with
//! exactly one terminal signal carrying the trailing echo metadata. Streaming
//! responses go through a per-call [`DelayQueue`]: one task per requested
//! response, then a task that closes the call, so responses leave in request
//! order with the requested spacing and the close always comes last.
//!
//! Handlers never return errors. Whatever goes wrong becomes the call's
//! terminal status. When the client goes away mid-schedule the call's queue
//! is cancelled, so no timer outlives the connection.

use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use interop_core::logging::events;
use interop_core::{interval_from_micros, DelayQueue, QueueError};
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};
use tracing::{Instrument, Span};

use crate::call::{CallWriter, ServerCall};
use crate::echo;
use crate::payload;
use crate::pb::{
    EchoStatus, Empty, PayloadType, ResponseParameters, SimpleRequest, SimpleResponse,
    StreamingInputCallRequest, StreamingInputCallResponse, StreamingOutputCallRequest,
    StreamingOutputCallResponse,
};
use crate::router::TestMethod;

pub fn empty_call(mut call: ServerCall<Empty>, _request: Empty) {
    let method = TestMethod::EmptyCall.name();
    events::call_started(method);
    respond(&mut call, method, Empty {});
}

pub fn unary_call(mut call: ServerCall<SimpleResponse>, request: SimpleRequest) {
    let method = TestMethod::UnaryCall.name();
    events::call_started(method);
    call.echo_initial_metadata();

    if let Some(status) = injected_status(request.response_status.as_ref()) {
        return terminate(&mut call, method, status);
    }

    let size = match payload::requested_size(request.response_size) {
        Ok(size) => size,
        Err(status) => return terminate(&mut call, method, status),
    };
    let response = SimpleResponse {
        payload: Some(payload::build(payload::requested_type(request.response_type), size)),
        ..Default::default()
    };
    respond(&mut call, method, response);
}

/// Sum the payload sizes of every inbound message and answer once the client
/// half-closes.
pub async fn streaming_input_call<S>(mut call: ServerCall<StreamingInputCallResponse>, inbound: S)
where
    S: Stream<Item = Result<StreamingInputCallRequest, Status>>,
{
    let method = TestMethod::StreamingInputCall.name();
    events::call_started(method);
    call.echo_initial_metadata();

    let mut inbound = pin!(inbound);
    let mut total: usize = 0;
    while let Some(item) = inbound.next().await {
        match item {
            Ok(request) => {
                total = total.saturating_add(payload::body_len(request.payload.as_ref()));
            }
            Err(status) => {
                events::inbound_error(method, status.message());
                return terminate(&mut call, method, status);
            }
        }
    }

    let Ok(aggregated_payload_size) = i32::try_from(total) else {
        let status = Status::out_of_range(format!("aggregated payload size {total} exceeds i32"));
        return terminate(&mut call, method, status);
    };
    respond(
        &mut call,
        method,
        StreamingInputCallResponse {
            aggregated_payload_size,
        },
    );
}

pub fn streaming_output_call(
    mut call: ServerCall<StreamingOutputCallResponse>,
    request: StreamingOutputCallRequest,
) {
    let method = TestMethod::StreamingOutputCall.name();
    events::call_started(method);
    call.echo_initial_metadata();

    if let Some(status) = injected_status(request.response_status.as_ref()) {
        return terminate(&mut call, method, status);
    }

    let plan = match response_plan(&request.response_parameters) {
        Ok(plan) => plan,
        Err(status) => return terminate(&mut call, method, status),
    };

    let queue = DelayQueue::new();
    let payload_type = payload::requested_type(request.response_type);
    let scheduled = plan
        .into_iter()
        .try_for_each(|(size, delay)| schedule_payload(&queue, call.writer(), payload_type, size, delay))
        .and_then(|()| schedule_close(&queue, call.writer(), call.trailing_metadata(), method));
    if let Err(err) = scheduled {
        queue.cancel();
        return terminate(&mut call, method, queue_status(err));
    }

    tokio::spawn(
        async move {
            let writer = call.writer();
            if let Err(err) = settle(&queue, &writer, method).await {
                terminate(&mut call, method, queue_status(err));
            }
        }
        .instrument(Span::current()),
    );
}

/// Answer each inbound message with its requested responses as they arrive,
/// all on one queue. Returns once the call is closed or the client is gone.
pub async fn full_duplex_call<S>(call: ServerCall<StreamingOutputCallResponse>, inbound: S)
where
    S: Stream<Item = Result<StreamingOutputCallRequest, Status>>,
{
    answer_on_queue(DelayQueue::new(), call, inbound).await
}

async fn answer_on_queue<S>(
    queue: DelayQueue,
    mut call: ServerCall<StreamingOutputCallResponse>,
    inbound: S,
) where
    S: Stream<Item = Result<StreamingOutputCallRequest, Status>>,
{
    let method = TestMethod::FullDuplexCall.name();
    events::call_started(method);
    call.echo_initial_metadata();

    let writer = call.writer();
    let mut inbound = pin!(inbound);
    loop {
        let item = tokio::select! {
            item = inbound.next() => item,
            () = writer.closed() => return abandon(&queue, method),
        };
        let request = match item {
            Some(Ok(request)) => request,
            Some(Err(status)) => {
                events::inbound_error(method, status.message());
                queue.cancel();
                return terminate(&mut call, method, status);
            }
            None => break,
        };

        if let Some(status) = injected_status(request.response_status.as_ref()) {
            queue.cancel();
            return terminate(&mut call, method, status);
        }

        let plan = match response_plan(&request.response_parameters) {
            Ok(plan) => plan,
            Err(status) => {
                queue.cancel();
                return terminate(&mut call, method, status);
            }
        };
        let payload_type = payload::requested_type(request.response_type);
        for (size, delay) in plan {
            if let Err(err) = schedule_payload(&queue, call.writer(), payload_type, size, delay) {
                queue.cancel();
                return terminate(&mut call, method, queue_status(err));
            }
        }
    }

    let closed = schedule_close(&queue, call.writer(), call.trailing_metadata(), method);
    if let Err(err) = closed {
        queue.cancel();
        return terminate(&mut call, method, queue_status(err));
    }
    if let Err(err) = settle(&queue, &writer, method).await {
        terminate(&mut call, method, queue_status(err));
    }
}

pub fn half_duplex_call<M, S>(mut call: ServerCall<M>, _inbound: S) {
    let method = TestMethod::HalfDuplexCall.name();
    events::call_started(method);
    terminate(
        &mut call,
        method,
        Status::unimplemented("HalfDuplexCall not yet implemented"),
    );
}

/// Status the client asked the server to fail with. Code 0 means none.
fn injected_status(requested: Option<&EchoStatus>) -> Option<Status> {
    let requested = requested.filter(|status| status.code != 0)?;
    Some(Status::new(
        Code::from(requested.code),
        requested.message.clone(),
    ))
}

/// Validated `(size, delay)` pairs, or `INVALID_ARGUMENT` when any size is
/// negative. Negative intervals count as no delay.
fn response_plan(params: &[ResponseParameters]) -> Result<Vec<(usize, Duration)>, Status> {
    params
        .iter()
        .map(|p| Ok((payload::requested_size(p.size)?, interval_from_micros(p.interval_us))))
        .collect()
}

fn schedule_payload(
    queue: &DelayQueue,
    writer: CallWriter<StreamingOutputCallResponse>,
    payload_type: PayloadType,
    size: usize,
    delay: Duration,
) -> Result<(), QueueError> {
    queue.add(
        move |advance| {
            let response = StreamingOutputCallResponse {
                payload: Some(payload::build(payload_type, size)),
            };
            match writer.write(response) {
                Ok(()) => events::payload_written(size),
                Err(err) => events::write_dropped(&err.to_string()),
            }
            advance.advance();
        },
        delay,
    )?;
    events::payload_scheduled(size, delay);
    Ok(())
}

fn schedule_close<M: Send + 'static>(
    queue: &DelayQueue,
    writer: CallWriter<M>,
    trailers: MetadataMap,
    method: &'static str,
) -> Result<(), QueueError> {
    queue.add_now(move |advance| {
        match writer.finish(trailers) {
            Ok(()) => events::call_finished(method),
            Err(err) => events::write_dropped(&err.to_string()),
        }
        advance.advance();
    })
}

/// Wait for `queue` to run dry. A client that leaves first takes the rest of
/// the queue with it.
async fn settle<M>(queue: &DelayQueue, writer: &CallWriter<M>, method: &str) -> Result<(), QueueError> {
    tokio::select! {
        settled = queue.wait_idle() => settled,
        () = writer.closed() => {
            abandon(queue, method);
            Ok(())
        }
    }
}

fn abandon(queue: &DelayQueue, method: &str) {
    events::peer_gone(method, queue.pending());
    queue.cancel();
}

fn queue_status(err: QueueError) -> Status {
    Status::internal(err.to_string())
}

fn respond<M>(call: &mut ServerCall<M>, method: &str, message: M) {
    match call.respond(message) {
        Ok(()) => events::call_finished(method),
        Err(err) => events::write_dropped(&err.to_string()),
    }
}

/// End the call with `status` plus the trailing echo metadata.
fn terminate<M>(call: &mut ServerCall<M>, method: &str, status: Status) {
    events::call_failed(method, status.code() as i32, status.message());
    let status = echo::with_metadata(status, call.trailing_metadata());
    if let Err(err) = call.fail(status) {
        events::write_dropped(&err.to_string());
    }
}
