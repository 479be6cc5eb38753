use futures::stream;
use interop_tonic::call::{self, TrailerSlot};
use interop_tonic::echo::{ECHO_INITIAL_KEY, ECHO_TRAILING_KEY};
use interop_tonic::handlers;
use interop_tonic::pb::{PayloadType, StreamingInputCallRequest};
use interop_tonic::payload;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Code, Status};

fn message(size: usize) -> Result<StreamingInputCallRequest, Status> {
    Ok(StreamingInputCallRequest {
        payload: Some(payload::build(PayloadType::Compressable, size)),
        expect_compressed: None,
    })
}

#[tokio::test]
async fn aggregate_is_the_sum_of_payload_sizes() {
    let mut metadata = MetadataMap::new();
    metadata.insert(ECHO_INITIAL_KEY, MetadataValue::from_static("agg"));
    metadata.insert_bin(ECHO_TRAILING_KEY, MetadataValue::from_bytes(b"\x01"));
    let slot = TrailerSlot::new();
    let (call, rx) = call::channel(metadata, slot.clone());

    handlers::streaming_input_call(call, stream::iter(vec![message(3), message(4), message(5)]))
        .await;

    let response = rx.into_unary().await.unwrap();
    assert_eq!(response.metadata().get(ECHO_INITIAL_KEY).unwrap(), "agg");
    assert_eq!(response.into_inner().aggregated_payload_size, 12);
    assert!(slot.take().unwrap().get_bin(ECHO_TRAILING_KEY).is_some());
}

#[tokio::test]
async fn interop_sizes_add_up() {
    let (call, rx) = call::channel(MetadataMap::new(), TrailerSlot::new());
    let sizes = [27_182, 8, 1_828, 45_904];

    handlers::streaming_input_call(call, stream::iter(sizes.map(message))).await;

    let response = rx.into_unary().await.unwrap();
    assert_eq!(response.into_inner().aggregated_payload_size, 74_922);
}

#[tokio::test]
async fn no_messages_aggregate_to_zero() {
    let (call, rx) = call::channel(MetadataMap::new(), TrailerSlot::new());

    handlers::streaming_input_call(call, stream::empty()).await;

    let response = rx.into_unary().await.unwrap();
    assert_eq!(response.into_inner().aggregated_payload_size, 0);
}

#[tokio::test]
async fn messages_without_payload_count_as_zero() {
    let (call, rx) = call::channel(MetadataMap::new(), TrailerSlot::new());
    let bare = Ok(StreamingInputCallRequest::default());

    handlers::streaming_input_call(call, stream::iter(vec![bare, message(6)])).await;

    let response = rx.into_unary().await.unwrap();
    assert_eq!(response.into_inner().aggregated_payload_size, 6);
}

#[tokio::test]
async fn inbound_error_aborts_the_call() {
    let mut metadata = MetadataMap::new();
    metadata.insert_bin(ECHO_TRAILING_KEY, MetadataValue::from_bytes(b"\x02"));
    let (call, rx) = call::channel(metadata, TrailerSlot::new());
    let inbound = stream::iter(vec![message(1), Err(Status::cancelled("client went away"))]);

    handlers::streaming_input_call(call, inbound).await;

    let status = rx.into_unary().await.unwrap_err();
    assert_eq!(status.code(), Code::Cancelled);
    assert!(status.metadata().get_bin(ECHO_TRAILING_KEY).is_some());
}
