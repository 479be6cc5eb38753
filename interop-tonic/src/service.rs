//! tonic glue for `grpc.testing.TestService`.
//!
//! [`TestServiceServer`] is a `tower` service in the shape tonic's code
//! generator produces, but dispatching through the [`Router`] table. Each
//! invocation gets a fresh call object; the handler drives the [`ServerCall`]
//! half while this module turns the [`CallReceiver`](crate::call::CallReceiver)
//! half into a tonic response and wraps the encoded body in a [`TrailerBody`]
//! so the trailing echo reaches the HTTP/2 trailers.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use interop_core::logging::call_span;
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{empty_body, Body, BoxFuture, Service, StdError};
use tonic::server::{
    ClientStreamingService, Grpc, NamedService, ServerStreamingService, StreamingService,
    UnaryService,
};
use tonic::{Status, Streaming};
use tracing::Instrument;

use crate::body::TrailerBody;
use crate::call::{self, ServerCall, TrailerSlot};
use crate::config::MessageLimits;
use crate::handlers;
use crate::pb::{
    Empty, SimpleRequest, SimpleResponse, StreamingInputCallRequest, StreamingInputCallResponse,
    StreamingOutputCallRequest, StreamingOutputCallResponse,
};
use crate::router::{Router, TestMethod, SERVICE_NAME};
use crate::stream::OutboundStream;

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handler that answers a single decoded request.
type RequestHandler<Req, Res> = fn(ServerCall<Res>, Req);

/// Handler that consumes the inbound message stream.
type InboundHandler<Req, Res> = fn(ServerCall<Res>, Streaming<Req>) -> HandlerFuture;

/// The interop `TestService`, ready for `tonic::transport::Server::add_service`.
#[derive(Debug, Clone)]
pub struct TestServiceServer {
    router: Arc<Router>,
    limits: MessageLimits,
}

impl TestServiceServer {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            limits: MessageLimits::default(),
        }
    }

    /// Apply the message size limits from a [`ServerConfig`].
    ///
    /// [`ServerConfig`]: crate::ServerConfig
    pub(crate) fn with_limits(mut self, limits: MessageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

impl Default for TestServiceServer {
    fn default() -> Self {
        Self::new(Router::interop())
    }
}

impl NamedService for TestServiceServer {
    const NAME: &'static str = SERVICE_NAME;
}

impl<B> Service<http::Request<B>> for TestServiceServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let Some(method) = self.router.resolve(req.uri().path()) else {
            tracing::debug!(path = req.uri().path(), "Unknown method");
            return Box::pin(async move { Ok(unimplemented()) });
        };

        let limits = self.limits;
        let trailers = TrailerSlot::new();
        match method {
            TestMethod::EmptyCall => {
                let svc = UnarySvc::new(method, handlers::empty_call, trailers.clone());
                Box::pin(async move {
                    let res = codec::<Empty, Empty>(limits).unary(svc, req).await;
                    Ok(with_trailers(res, trailers))
                })
            }
            TestMethod::UnaryCall => {
                let svc = UnarySvc::new(method, handlers::unary_call, trailers.clone());
                Box::pin(async move {
                    let res = codec::<SimpleResponse, SimpleRequest>(limits)
                        .unary(svc, req)
                        .await;
                    Ok(with_trailers(res, trailers))
                })
            }
            TestMethod::StreamingOutputCall => {
                let svc =
                    ServerStreamingSvc::new(method, handlers::streaming_output_call, trailers.clone());
                Box::pin(async move {
                    let res = codec::<StreamingOutputCallResponse, StreamingOutputCallRequest>(limits)
                        .server_streaming(svc, req)
                        .await;
                    Ok(with_trailers(res, trailers))
                })
            }
            TestMethod::StreamingInputCall => {
                let svc = ClientStreamingSvc::new(method, streaming_input, trailers.clone());
                Box::pin(async move {
                    let res = codec::<StreamingInputCallResponse, StreamingInputCallRequest>(limits)
                        .client_streaming(svc, req)
                        .await;
                    Ok(with_trailers(res, trailers))
                })
            }
            TestMethod::FullDuplexCall => {
                let svc = BidiSvc::new(method, full_duplex, trailers.clone());
                Box::pin(async move {
                    let res = codec::<StreamingOutputCallResponse, StreamingOutputCallRequest>(limits)
                        .streaming(svc, req)
                        .await;
                    Ok(with_trailers(res, trailers))
                })
            }
            TestMethod::HalfDuplexCall => {
                let svc = BidiSvc::new(method, half_duplex, trailers.clone());
                Box::pin(async move {
                    let res = codec::<StreamingOutputCallResponse, StreamingOutputCallRequest>(limits)
                        .streaming(svc, req)
                        .await;
                    Ok(with_trailers(res, trailers))
                })
            }
        }
    }
}

fn streaming_input(
    call: ServerCall<StreamingInputCallResponse>,
    inbound: Streaming<StreamingInputCallRequest>,
) -> HandlerFuture {
    Box::pin(handlers::streaming_input_call(call, inbound))
}

fn full_duplex(
    call: ServerCall<StreamingOutputCallResponse>,
    inbound: Streaming<StreamingOutputCallRequest>,
) -> HandlerFuture {
    Box::pin(handlers::full_duplex_call(call, inbound))
}

fn half_duplex(
    call: ServerCall<StreamingOutputCallResponse>,
    inbound: Streaming<StreamingOutputCallRequest>,
) -> HandlerFuture {
    handlers::half_duplex_call(call, inbound);
    Box::pin(async {})
}

fn codec<Res, Req>(limits: MessageLimits) -> Grpc<ProstCodec<Res, Req>>
where
    Res: prost::Message + Send + 'static,
    Req: prost::Message + Default + Send + 'static,
{
    Grpc::new(ProstCodec::default())
        .apply_max_message_size_config(limits.max_decoding, limits.max_encoding)
}

fn with_trailers(res: http::Response<BoxBody>, trailers: TrailerSlot) -> http::Response<BoxBody> {
    res.map(|body| tonic::body::boxed(TrailerBody::new(body, trailers)))
}

fn unimplemented() -> http::Response<BoxBody> {
    let mut response = http::Response::new(empty_body());
    let headers = response.headers_mut();
    headers.insert(
        "grpc-status",
        http::HeaderValue::from(tonic::Code::Unimplemented as i32),
    );
    headers.insert(
        http::header::CONTENT_TYPE,
        tonic::metadata::GRPC_CONTENT_TYPE,
    );
    response
}

struct UnarySvc<Req, Res> {
    method: TestMethod,
    handler: RequestHandler<Req, Res>,
    trailers: TrailerSlot,
}

impl<Req, Res> UnarySvc<Req, Res> {
    fn new(method: TestMethod, handler: RequestHandler<Req, Res>, trailers: TrailerSlot) -> Self {
        Self {
            method,
            handler,
            trailers,
        }
    }
}

impl<Req, Res> UnaryService<Req> for UnarySvc<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    type Response = Res;
    type Future = BoxFuture<tonic::Response<Res>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        let (method, handler, trailers) = (self.method, self.handler, self.trailers.clone());
        Box::pin(async move {
            let (metadata, _, message) = request.into_parts();
            let (call, receiver) = call::channel(metadata, trailers);
            call_span(method.path()).in_scope(|| handler(call, message));
            receiver.into_unary().await
        })
    }
}

struct ServerStreamingSvc<Req, Res> {
    method: TestMethod,
    handler: RequestHandler<Req, Res>,
    trailers: TrailerSlot,
}

impl<Req, Res> ServerStreamingSvc<Req, Res> {
    fn new(method: TestMethod, handler: RequestHandler<Req, Res>, trailers: TrailerSlot) -> Self {
        Self {
            method,
            handler,
            trailers,
        }
    }
}

impl<Req, Res> ServerStreamingService<Req> for ServerStreamingSvc<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    type Response = Res;
    type ResponseStream = OutboundStream<Res>;
    type Future = BoxFuture<tonic::Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        let (method, handler, trailers) = (self.method, self.handler, self.trailers.clone());
        Box::pin(async move {
            let (metadata, _, message) = request.into_parts();
            let (call, receiver) = call::channel(metadata, trailers);
            // Responses are driven by the call's delay queue, not this future.
            call_span(method.path()).in_scope(|| handler(call, message));
            Ok(receiver.into_streaming().await)
        })
    }
}

struct ClientStreamingSvc<Req, Res> {
    method: TestMethod,
    handler: InboundHandler<Req, Res>,
    trailers: TrailerSlot,
}

impl<Req, Res> ClientStreamingSvc<Req, Res> {
    fn new(method: TestMethod, handler: InboundHandler<Req, Res>, trailers: TrailerSlot) -> Self {
        Self {
            method,
            handler,
            trailers,
        }
    }
}

impl<Req, Res> ClientStreamingService<Req> for ClientStreamingSvc<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    type Response = Res;
    type Future = BoxFuture<tonic::Response<Res>, Status>;

    fn call(&mut self, request: tonic::Request<Streaming<Req>>) -> Self::Future {
        let (method, handler, trailers) = (self.method, self.handler, self.trailers.clone());
        Box::pin(async move {
            let (metadata, _, inbound) = request.into_parts();
            let (call, receiver) = call::channel(metadata, trailers);
            handler(call, inbound)
                .instrument(call_span(method.path()))
                .await;
            receiver.into_unary().await
        })
    }
}

struct BidiSvc<Req, Res> {
    method: TestMethod,
    handler: InboundHandler<Req, Res>,
    trailers: TrailerSlot,
}

impl<Req, Res> BidiSvc<Req, Res> {
    fn new(method: TestMethod, handler: InboundHandler<Req, Res>, trailers: TrailerSlot) -> Self {
        Self {
            method,
            handler,
            trailers,
        }
    }
}

impl<Req, Res> StreamingService<Req> for BidiSvc<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    type Response = Res;
    type ResponseStream = OutboundStream<Res>;
    type Future = BoxFuture<tonic::Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: tonic::Request<Streaming<Req>>) -> Self::Future {
        let (method, handler, trailers) = (self.method, self.handler, self.trailers.clone());
        Box::pin(async move {
            let (metadata, _, inbound) = request.into_parts();
            let (call, receiver) = call::channel(metadata, trailers);
            // Reading the inbound stream and writing responses overlap, so the
            // handler outlives this future.
            tokio::spawn(handler(call, inbound).instrument(call_span(method.path())));
            Ok(receiver.into_streaming().await)
        })
    }
}
