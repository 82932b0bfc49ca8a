//! # Envelope Framing
//!
//! Purpose: Encode and decode the length-prefixed envelope that wraps every
//! request and response on the wire.
//!
//! ## Design Principles
//!
//! 1. **Bit-Exact Layout**: Big-endian `u32` length, one code byte, raw body.
//! 2. **Single Buffer**: A request is encoded into one contiguous buffer so the
//!    caller can hand it to the socket in a single write.
//! 3. **Zero-Copy Bodies**: Decoded bodies are `Bytes` slices of the frame.
//! 4. **Fail Fast**: Zero or oversized lengths and unknown codes are rejected
//!    immediately.
//!
//! ## Memory Layout Example
//!
//! ```text
//! Envelope (4 + length bytes total):
//! +-----------+---------+------------------+
//! | length:4B | code:1B | body:(length-1)B |
//! +-----------+---------+------------------+
//!
//! length = 1 + len(body), big-endian
//!
//! PingReq (no body):
//! +-------------+------+
//! | 00 00 00 01 | 01   |
//! +-------------+------+
//! ```
//!
//! Body contents are operation specific and opaque at this layer.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codes::MessageCode;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Size of the message code that follows the prefix.
pub const CODE_LEN: usize = 1;

/// Largest body that still fits the `u32` length prefix.
pub const MAX_BODY_LEN: usize = u32::MAX as usize - CODE_LEN;

/// Default cap on an incoming frame (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// A decoded envelope: message code plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message code carried in the first byte after the prefix.
    pub code: MessageCode,
    /// Operation specific payload (may be empty).
    pub body: Bytes,
}

impl Envelope {
    /// Builds an envelope for the provided code and body.
    pub fn new(code: MessageCode, body: impl Into<Bytes>) -> Self {
        Envelope {
            code,
            body: body.into(),
        }
    }

    /// Builds an envelope without a body.
    pub fn empty(code: MessageCode) -> Self {
        Envelope {
            code,
            body: Bytes::new(),
        }
    }

    /// Value of the length prefix for this envelope (`1 + len(body)`).
    pub fn frame_len(&self) -> usize {
        CODE_LEN + self.body.len()
    }

    /// Appends the encoded envelope to `out`.
    pub fn encode(&self, out: &mut BytesMut) -> ProtocolResult<()> {
        encode_request(self.code, &self.body, out)
    }

    /// Decodes an envelope from the bytes that follow the length prefix.
    ///
    /// `payload` must be exactly `length` bytes: the code byte and the body.
    pub fn from_payload(mut payload: Bytes) -> ProtocolResult<Self> {
        if payload.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }
        let code = MessageCode::try_from(payload.get_u8())?;
        Ok(Envelope {
            code,
            body: payload,
        })
    }
}

/// Encodes a request envelope (`length + code + body`) into `out`.
///
/// # Errors
/// Returns `ProtocolError::BodyTooLarge` when the body cannot be described by
/// the `u32` prefix; nothing is appended in that case.
pub fn encode_request(code: MessageCode, body: &[u8], out: &mut BytesMut) -> ProtocolResult<()> {
    if body.len() > MAX_BODY_LEN {
        return Err(ProtocolError::BodyTooLarge(body.len()));
    }
    out.reserve(LENGTH_PREFIX_LEN + CODE_LEN + body.len());
    out.put_u32((CODE_LEN + body.len()) as u32);
    out.put_u8(code.as_u8());
    out.put_slice(body);
    Ok(())
}

/// Interprets a length prefix, rejecting frames that cannot hold a code byte.
pub fn parse_length_prefix(prefix: [u8; LENGTH_PREFIX_LEN]) -> ProtocolResult<usize> {
    match u32::from_be_bytes(prefix) {
        0 => Err(ProtocolError::EmptyFrame),
        len => Ok(len as usize),
    }
}

/// Like [`parse_length_prefix`], but also rejects lengths above `max`.
///
/// Call this before allocating the payload buffer.
pub fn parse_bounded_length_prefix(
    prefix: [u8; LENGTH_PREFIX_LEN],
    max: usize,
) -> ProtocolResult<usize> {
    let len = parse_length_prefix(prefix)?;
    if len > max {
        return Err(ProtocolError::FrameTooLarge { len, max });
    }
    Ok(len)
}
