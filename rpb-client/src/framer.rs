//! # Envelope Framer
//!
//! Purpose: Move envelopes between a blocking socket and typed responses.
//!
//! ## Design Principles
//! 1. **Atomic Writes**: Length, code and body go out in one `write_all`.
//! 2. **Exact Reads**: Read the prefix, then exactly `length` bytes, never more.
//! 3. **Capability Decoders**: Payload decoding is delegated to a
//!    `ResponseDecoder`, one per operation family.
//! 4. **No Hidden Retries**: I/O errors propagate untouched; resetting the
//!    connection is the caller's decision.

use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};
use rpb_common::{
    encode_request, parse_bounded_length_prefix, Envelope, MessageCode, LENGTH_PREFIX_LEN,
};
use tracing::trace;

use crate::client::{ClientError, ClientResult};

/// Turns a raw response envelope into a typed response.
pub trait ResponseDecoder {
    type Response;

    /// Decodes one envelope whose code is already validated.
    fn decode(&self, envelope: Envelope) -> ClientResult<Self::Response>;
}

impl<D: ResponseDecoder + ?Sized> ResponseDecoder for &D {
    type Response = D::Response;

    fn decode(&self, envelope: Envelope) -> ClientResult<Self::Response> {
        (**self).decode(envelope)
    }
}

/// Returns the envelope as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl ResponseDecoder for RawDecoder {
    type Response = Envelope;

    fn decode(&self, envelope: Envelope) -> ClientResult<Envelope> {
        Ok(envelope)
    }
}

/// Accepts exactly one response code and returns its body.
#[derive(Debug, Clone, Copy)]
pub struct ExpectCode(pub MessageCode);

impl ResponseDecoder for ExpectCode {
    type Response = Bytes;

    fn decode(&self, envelope: Envelope) -> ClientResult<Bytes> {
        if envelope.code == self.0 {
            Ok(envelope.body)
        } else {
            Err(ClientError::UnexpectedResponse {
                expected: self.0,
                actual: envelope.code,
            })
        }
    }
}

/// Encodes a request into `buf` and writes it with a single `write_all`.
///
/// `buf` is cleared first so callers can reuse one buffer per connection.
pub fn write_request<W: Write>(
    writer: &mut W,
    buf: &mut BytesMut,
    code: MessageCode,
    body: &[u8],
) -> ClientResult<()> {
    buf.clear();
    encode_request(code, body, buf)?;
    writer.write_all(&buf[..])?;
    writer.flush()?;
    trace!(code = %code, len = buf.len(), "wrote request envelope");
    Ok(())
}

/// Reads one envelope: 4-byte prefix, then exactly `length` bytes.
///
/// Lengths above `max_frame_len` are rejected before anything is allocated;
/// the stream is left mid-frame in that case.
pub fn read_envelope<R: Read>(reader: &mut R, max_frame_len: usize) -> ClientResult<Envelope> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut prefix)?;
    let len = parse_bounded_length_prefix(prefix, max_frame_len)?;

    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload[..])?;

    let envelope = Envelope::from_payload(payload.freeze())?;
    trace!(code = %envelope.code, len, "read response envelope");
    Ok(envelope)
}

/// Reads one envelope and hands it to `decoder`.
pub fn read_response<R: Read, D: ResponseDecoder>(
    reader: &mut R,
    decoder: &D,
    max_frame_len: usize,
) -> ClientResult<D::Response> {
    decoder.decode(read_envelope(reader, max_frame_len)?)
}
