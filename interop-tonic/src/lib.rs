//! `interop-tonic` serves `grpc.testing.TestService`, the service gRPC
//! implementations use to check each other for conformance, on top of tonic.
//!
//! Layout:
//! - [`pb`]: the wire messages, field-for-field with the upstream protos.
//! - [`call`]: the per-call object handlers write to.
//! - [`handlers`]: one function per `TestService` method. Streaming responses
//!   are paced by an [`interop_core::DelayQueue`].
//! - [`service`]: the tonic service that dispatches through the [`Router`]
//!   and merges echoed trailers into the HTTP/2 trailers.
//! - [`transport`]: binding and serving.
//!
//! ```rust,no_run
//! use interop_tonic::{serve, ServerConfig};
//!
//! # async fn run() -> Result<(), interop_tonic::ServeError> {
//! let config = ServerConfig::from_host_port("0.0.0.0", 10000)?;
//! serve(config, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod addr;
pub mod body;
pub mod call;
pub mod config;
pub mod echo;
pub mod error;
pub mod handlers;
pub mod payload;
pub mod pb;
pub mod router;
pub mod service;
pub mod stream;
pub mod transport;

pub use call::{CallReceiver, CallWriter, ServerCall, TrailerSlot};
pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{CallError, ServeError};
pub use router::{Router, TestMethod, SERVICE_NAME};
pub use service::TestServiceServer;
pub use stream::OutboundStream;
pub use transport::{serve, serve_with_listener};

pub use tonic::{Code, Request, Response, Status};
