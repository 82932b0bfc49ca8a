//! # Protocol Buffers Transport Client
//!
//! Purpose: Provide a blocking client transport for the length-prefixed
//! protocol buffers interface over one persistent TCP connection.
//!
//! ## Design Principles
//! 1. **One Connection**: A client owns one socket and runs one request at a time.
//! 2. **Deterministic Failover**: Unreachable endpoints are blacklisted and
//!    replaced from an `EndpointPool` until one connects or the pool runs dry.
//! 3. **Envelope Only**: Payload encodings plug in through `ResponseDecoder`.
//! 4. **Protocol Clarity**: Codes and framing come from `rpb-common`.

mod client;
mod connection;
mod dispatch;
mod endpoint;
mod framer;
mod keygen;

pub use client::{ClientConfig, ClientError, ClientResult, PbClient};
pub use connection::{
    Connection, ConnectionManager, ConnectionPhase, ConnectionSettings, CONNECT_TIMEOUT,
};
pub use dispatch::SimpleOperation;
pub use endpoint::{Endpoint, EndpointPool, SharedEndpoint, StaticEndpointPool};
pub use framer::{
    read_envelope, read_response, write_request, ExpectCode, RawDecoder, ResponseDecoder,
};
pub use keygen::{generate_key, key_for};
pub use rpb_common::{
    normalize_quorum, Envelope, MessageCode, ProtocolError, QuorumValue, DEFAULT_MAX_FRAME_LEN,
};
