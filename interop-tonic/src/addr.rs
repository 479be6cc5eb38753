use std::net::{IpAddr, SocketAddr};

use crate::error::ServeError;

pub(crate) fn parse_socket_addr(input: &str) -> Result<SocketAddr, ServeError> {
    // Accept plain "0.0.0.0:10000" and URI-like "http://0.0.0.0:10000".
    let trimmed = input.trim();

    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);

    let host_port = without_scheme
        .split_once('/')
        .map(|(hp, _)| hp)
        .unwrap_or(without_scheme);

    host_port
        .parse::<SocketAddr>()
        .map_err(|e| invalid(input, e.to_string()))
}

/// Listen address from a bare host (IPv4, IPv6, or `localhost`) and a port.
pub(crate) fn listen_addr(host: &str, port: u16) -> Result<SocketAddr, ServeError> {
    let trimmed = host.trim();
    if trimmed.eq_ignore_ascii_case("localhost") {
        return Ok(SocketAddr::from(([127, 0, 0, 1], port)));
    }

    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(trimmed);

    unbracketed
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|e| invalid(host, e.to_string()))
}

fn invalid(addr: &str, reason: String) -> ServeError {
    ServeError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    }
}
