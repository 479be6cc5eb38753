//! Structured logging for the interop server
//!
//! Everything in the workspace logs through `tracing`. This module installs a
//! `tracing-subscriber` formatter and offers span and event helpers so call
//! handlers report lifecycle events with consistent field names.
//!
//! # Controlling output
//!
//! ```bash
//! # Default (info level)
//! interop-server --port 10000
//!
//! # Everything the delay queue does
//! RUST_LOG=interop_core::delay_queue=trace interop-server --port 10000
//!
//! # Handler decisions plus queue scheduling
//! RUST_LOG=interop_tonic=debug,interop_core=debug interop-server --port 10000
//! ```
//!
//! `RUST_LOG` always wins over the level passed to the init functions.
//!
//! Level guidelines:
//! - **TRACE**: queue scheduling and individual payload writes
//! - **DEBUG**: call start/finish, dropped writes, cancelled queues
//! - **INFO**: server start and shutdown
//! - **WARN**: stalled queues, inbound stream errors
//! - **ERROR**: failures that take the server down

use std::time::Duration;

use tracing::{debug, info, trace, warn, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::time::as_micros_u64;

/// Initialize logging at `info`.
pub fn init_logging() {
    init_logging_with_level("info")
}

/// Initialize logging with a specific level for the workspace crates.
///
/// # Arguments
/// * `level` - "trace", "debug", "info", "warn" or "error"
///
/// Calling this more than once is harmless; only the first call installs a
/// subscriber.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("info,interop_core={level},interop_tonic={level},interop_server={level}").into()
    });

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Logging initialized at level: {}", level);
    }
}

/// Initialize verbose, pretty-printed logging for debugging a single call.
pub fn init_detailed_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "debug,interop_core=trace,interop_tonic=trace,h2=info".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Detailed logging initialized");
    }
}

/// Span covering one RPC invocation.
pub fn call_span(method: &str) -> Span {
    tracing::debug_span!("call", method = method)
}

/// Span for a delay queue's drain task. Nests under the current span.
pub fn queue_span() -> Span {
    tracing::trace_span!("delay_queue")
}

/// Lifecycle events of a single call.
pub mod events {
    use super::*;

    pub fn call_started(method: &str) {
        debug!(method = method, "Call started");
    }

    pub fn call_finished(method: &str) {
        debug!(method = method, "Call finished");
    }

    pub fn call_failed(method: &str, code: i32, message: &str) {
        debug!(method = method, code = code, message = message, "Call failed");
    }

    pub fn payload_scheduled(size: usize, delay: Duration) {
        trace!(size = size, delay_us = as_micros_u64(delay), "Payload scheduled");
    }

    pub fn payload_written(size: usize) {
        trace!(size = size, "Payload written");
    }

    /// A write or close that arrived after the call had already terminated.
    pub fn write_dropped(reason: &str) {
        debug!(reason = reason, "Write dropped");
    }

    pub fn inbound_error(method: &str, message: &str) {
        warn!(method = method, message = message, "Inbound stream failed");
    }

    /// The client went away with responses still queued.
    pub fn peer_gone(method: &str, discarded: usize) {
        debug!(method = method, discarded = discarded, "Peer gone, queue cancelled");
    }
}
