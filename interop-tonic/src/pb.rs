//! `grpc.testing` wire schema.
//!
//! Prost messages for the parts of `grpc/testing/empty.proto` and
//! `grpc/testing/messages.proto` that `TestService` uses. Field numbers match
//! the upstream interop protos so any conformant client can talk to this
//! server; fields the server never reads are omitted and skipped by prost on
//! decode.

/// The type of payload that should be returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PayloadType {
    /// Compressable text format.
    Compressable = 0,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

/// Wrapper used where the protos need a nullable bool.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BoolValue {
    #[prost(bool, tag = "1")]
    pub value: bool,
}

/// A block of data, to simply increase gRPC message size.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    #[prost(enumeration = "PayloadType", tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub body: ::prost::alloc::vec::Vec<u8>,
}

/// A protobuf representation for grpc status. Used by test clients to
/// specify a status that the server should attempt to return.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

/// Unary request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SimpleRequest {
    #[prost(enumeration = "PayloadType", tag = "1")]
    pub response_type: i32,
    #[prost(int32, tag = "2")]
    pub response_size: i32,
    #[prost(message, optional, tag = "3")]
    pub payload: ::core::option::Option<Payload>,
    #[prost(bool, tag = "4")]
    pub fill_username: bool,
    #[prost(bool, tag = "5")]
    pub fill_oauth_scope: bool,
    #[prost(message, optional, tag = "6")]
    pub response_compressed: ::core::option::Option<BoolValue>,
    #[prost(message, optional, tag = "7")]
    pub response_status: ::core::option::Option<EchoStatus>,
    #[prost(message, optional, tag = "8")]
    pub expect_compressed: ::core::option::Option<BoolValue>,
    #[prost(bool, tag = "9")]
    pub fill_server_id: bool,
}

/// Unary response, as configured by the request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SimpleResponse {
    #[prost(message, optional, tag = "1")]
    pub payload: ::core::option::Option<Payload>,
    #[prost(string, tag = "2")]
    pub username: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub oauth_scope: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub server_id: ::prost::alloc::string::String,
}

/// Client-streaming request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingInputCallRequest {
    #[prost(message, optional, tag = "1")]
    pub payload: ::core::option::Option<Payload>,
    #[prost(message, optional, tag = "2")]
    pub expect_compressed: ::core::option::Option<BoolValue>,
}

/// Client-streaming response.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct StreamingInputCallResponse {
    #[prost(int32, tag = "1")]
    pub aggregated_payload_size: i32,
}

/// Configuration for a particular response.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResponseParameters {
    #[prost(int32, tag = "1")]
    pub size: i32,
    #[prost(int32, tag = "2")]
    pub interval_us: i32,
    #[prost(message, optional, tag = "3")]
    pub compressed: ::core::option::Option<BoolValue>,
}

/// Server-streaming request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingOutputCallRequest {
    #[prost(enumeration = "PayloadType", tag = "1")]
    pub response_type: i32,
    #[prost(message, repeated, tag = "2")]
    pub response_parameters: ::prost::alloc::vec::Vec<ResponseParameters>,
    #[prost(message, optional, tag = "3")]
    pub payload: ::core::option::Option<Payload>,
    #[prost(message, optional, tag = "7")]
    pub response_status: ::core::option::Option<EchoStatus>,
}

/// Server-streaming response, as configured by the request and parameters.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingOutputCallResponse {
    #[prost(message, optional, tag = "1")]
    pub payload: ::core::option::Option<Payload>,
}
