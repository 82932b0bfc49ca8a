//! # Protocol Errors
//!
//! Errors raised while mapping names to codes or while framing envelopes.
//! These never involve I/O, so the type stays `Clone + Eq` for easy matching.

use thiserror::Error;

/// Result type for protocol-level operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced by the code table and the envelope codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A symbolic operation name is not in the message code table.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A wire byte does not map to any message code.
    #[error("unknown message code: {0}")]
    UnknownCode(u8),

    /// A length prefix of zero; every envelope carries at least the code byte.
    #[error("empty frame: length prefix must be at least 1")]
    EmptyFrame,

    /// A length prefix above the configured frame limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The body does not fit in a `u32` length prefix.
    #[error("body too large for a single frame: {0} bytes")]
    BodyTooLarge(usize),
}
