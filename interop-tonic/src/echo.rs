//! Metadata echoing.
//!
//! Interop clients ask the server to mirror two metadata entries: an ASCII
//! entry that comes back as a response header and a binary entry that comes
//! back as a trailer. Only the first value of each key is echoed. Missing
//! keys simply mean there is nothing to echo.

use tonic::metadata::MetadataMap;
use tonic::Status;

/// Request key whose first value is echoed in the response headers.
pub const ECHO_INITIAL_KEY: &str = "x-grpc-test-echo-initial";

/// Request key whose first value is echoed in the response trailers.
pub const ECHO_TRAILING_KEY: &str = "x-grpc-test-echo-trailing-bin";

/// Response headers to send for `metadata`, or `None` when the initial echo
/// key is absent.
pub fn initial_echo(metadata: &MetadataMap) -> Option<MetadataMap> {
    let value = metadata.get(ECHO_INITIAL_KEY)?;
    let mut headers = MetadataMap::new();
    headers.insert(ECHO_INITIAL_KEY, value.clone());
    Some(headers)
}

/// Trailing metadata to attach to every terminal response of a call.
///
/// Always returns a map; it is empty when the trailing echo key is absent.
pub fn trailing_echo(metadata: &MetadataMap) -> MetadataMap {
    let mut trailers = MetadataMap::new();
    if let Some(value) = metadata.get_bin(ECHO_TRAILING_KEY) {
        trailers.insert_bin(ECHO_TRAILING_KEY, value.clone());
    }
    trailers
}

/// Rebuild `status` with `extra` merged into its metadata.
///
/// Entries already on the status are kept; `extra` wins on key clashes.
pub(crate) fn with_metadata(status: Status, extra: MetadataMap) -> Status {
    if extra.is_empty() {
        return status;
    }
    let mut headers = status.metadata().clone().into_headers();
    for (key, value) in extra.into_headers() {
        if let Some(key) = key {
            headers.insert(key, value);
        }
    }
    Status::with_metadata(
        status.code(),
        status.message().to_string(),
        MetadataMap::from_headers(headers),
    )
}
