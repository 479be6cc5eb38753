use std::net::SocketAddr;

use crate::addr::{listen_addr, parse_socket_addr};
use crate::error::ServeError;

/// Port the interop server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 10000;

/// Server settings.
///
/// ```
/// use interop_tonic::ServerConfig;
///
/// let config = ServerConfig::default()
///     .listen_on("127.0.0.1:50051")
///     .unwrap()
///     .tcp_nodelay(false);
/// assert_eq!(config.listen_addr().port(), 50051);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    listen_addr: SocketAddr,
    concurrency_limit_per_connection: Option<usize>,
    tcp_nodelay: bool,
    max_decoding_message_size: Option<usize>,
    max_encoding_message_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            concurrency_limit_per_connection: None,
            tcp_nodelay: true,
            max_decoding_message_size: None,
            max_encoding_message_size: None,
        }
    }

    /// Listen on `host:port`, where `host` is an IP address or `localhost`.
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, ServeError> {
        Ok(Self::new(listen_addr(host, port)?))
    }

    /// Replace the listen address with `addr` (`host:port` or
    /// `http://host:port`).
    pub fn listen_on(mut self, addr: &str) -> Result<Self, ServeError> {
        self.listen_addr = parse_socket_addr(addr)?;
        Ok(self)
    }

    pub fn concurrency_limit_per_connection(mut self, limit: usize) -> Self {
        self.concurrency_limit_per_connection = Some(limit);
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Largest inbound message accepted. tonic's default (4 MiB) applies when
    /// unset.
    pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
        self.max_decoding_message_size = Some(limit);
        self
    }

    pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
        self.max_encoding_message_size = Some(limit);
        self
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrency_limit_per_connection
    }

    pub fn nodelay(&self) -> bool {
        self.tcp_nodelay
    }

    pub(crate) fn message_limits(&self) -> MessageLimits {
        MessageLimits {
            max_decoding: self.max_decoding_message_size,
            max_encoding: self.max_encoding_message_size,
        }
    }
}

/// Per-message size limits handed to every call's codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MessageLimits {
    pub(crate) max_decoding: Option<usize>,
    pub(crate) max_encoding: Option<usize>,
}
