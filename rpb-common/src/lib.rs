// rpb-common - Shared protocol definitions for the protocol buffers transport
//
// This crate defines the message code table, the length-prefixed envelope
// codec and the quorum value mapping. Nothing in here touches a socket.

pub mod codes;
pub mod error;
pub mod protocol;
pub mod quorum;

// Re-export for convenience
pub use codes::*;
pub use error::*;
pub use protocol::*;
pub use quorum::*;
