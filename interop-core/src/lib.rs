//! Core building blocks of the gRPC interop test server.
//!
//! The centrepiece is [`DelayQueue`]: a per-call, strictly ordered task runner
//! that waits a caller-chosen delay before each task and never lets two tasks
//! run at the same time. The streaming call handlers in `interop-tonic` push
//! one task per scheduled response message into it, followed by a final task
//! that closes the call.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use interop_core::DelayQueue;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), interop_core::QueueError> {
//! let queue = DelayQueue::new();
//! queue.add(|advance| {
//!     println!("first, after 10ms");
//!     advance.advance();
//! }, Duration::from_millis(10))?;
//! queue.add_now(|advance| {
//!     println!("second, right after the first");
//!     advance.advance();
//! })?;
//! queue.wait_idle().await?;
//! # Ok(())
//! # }
//! ```
//!
//! This crate has no gRPC dependency; it only needs a tokio runtime.

pub mod delay_queue;
pub mod error;
pub mod logging;
pub mod time;

pub use delay_queue::{Advance, DelayQueue, QueueState};
pub use error::{InteropError, QueueError};
pub use logging::{init_detailed_logging, init_logging, init_logging_with_level};
pub use time::interval_from_micros;
