use tonic::Status;

use crate::pb::{Payload, PayloadType};

/// Zero-filled payload of exactly `size` bytes.
pub fn build(payload_type: PayloadType, size: usize) -> Payload {
    Payload {
        r#type: payload_type as i32,
        body: vec![0; size],
    }
}

/// Payload type requested on the wire, falling back to the only defined type
/// for unknown values.
pub(crate) fn requested_type(raw: i32) -> PayloadType {
    PayloadType::try_from(raw).unwrap_or(PayloadType::Compressable)
}

/// Validate a wire-level size.
pub(crate) fn requested_size(size: i32) -> Result<usize, Status> {
    usize::try_from(size)
        .map_err(|_| Status::invalid_argument(format!("negative payload size requested: {size}")))
}

/// Body length of an optional inbound payload.
pub(crate) fn body_len(payload: Option<&Payload>) -> usize {
    payload.map_or(0, |p| p.body.len())
}
