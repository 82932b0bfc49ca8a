// codes.rs - message code table for the protocol buffers transport
//
// Every envelope on the wire carries a one-byte message code right after the
// length prefix. The code identifies both the request being sent and the
// response being returned.
//
// ============================================================================
// TABLE LAYOUT
// ============================================================================
//
// The code of a message IS its position in the table below (0-indexed). The
// server enumerates the same names in the same order, so:
//
// - Entries must never be reordered.
// - Entries must never be removed (that would shift every later code).
// - New entries may only be appended, and only once the server knows them.
//
// Requests and responses alternate: `XxxReq` is always followed by `XxxResp`,
// with `ErrorResp` (code 0) as the single response that can answer any
// request.
//
//   code  name                code  name
//   ----  ------------------  ----  ------------------
//      0  ErrorResp             13  DelReq
//      1  PingReq               14  DelResp
//      2  PingResp              15  ListBucketsReq
//      3  GetClientIdReq        16  ListBucketsResp
//      4  GetClientIdResp       17  ListKeysReq
//      5  SetClientIdReq        18  ListKeysResp
//      6  SetClientIdResp       19  GetBucketReq
//      7  GetServerInfoReq      20  GetBucketResp
//      8  GetServerInfoResp     21  SetBucketReq
//      9  GetReq                22  SetBucketResp
//     10  GetResp               23  MapRedReq
//     11  PutReq                24  MapRedResp
//     12  PutResp

use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, ProtocolResult};

/// Number of entries in the message code table.
pub const MESSAGE_CODE_COUNT: usize = 25;

/// All message codes understood by the transport.
///
/// The discriminant of each variant is its wire code.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageCode {
    /// Generic error reply, valid as the answer to any request
    ErrorResp = 0,
    PingReq = 1,
    PingResp = 2,
    GetClientIdReq = 3,
    GetClientIdResp = 4,
    SetClientIdReq = 5,
    SetClientIdResp = 6,
    GetServerInfoReq = 7,
    GetServerInfoResp = 8,
    GetReq = 9,
    GetResp = 10,
    PutReq = 11,
    PutResp = 12,
    DelReq = 13,
    DelResp = 14,
    ListBucketsReq = 15,
    ListBucketsResp = 16,
    ListKeysReq = 17,
    ListKeysResp = 18,
    GetBucketReq = 19,
    GetBucketResp = 20,
    SetBucketReq = 21,
    SetBucketResp = 22,
    MapRedReq = 23,
    MapRedResp = 24,
}

impl MessageCode {
    /// The full table in wire order; `ALL[code as usize]` is that code.
    pub const ALL: [MessageCode; MESSAGE_CODE_COUNT] = [
        Self::ErrorResp,
        Self::PingReq,
        Self::PingResp,
        Self::GetClientIdReq,
        Self::GetClientIdResp,
        Self::SetClientIdReq,
        Self::SetClientIdResp,
        Self::GetServerInfoReq,
        Self::GetServerInfoResp,
        Self::GetReq,
        Self::GetResp,
        Self::PutReq,
        Self::PutResp,
        Self::DelReq,
        Self::DelResp,
        Self::ListBucketsReq,
        Self::ListBucketsResp,
        Self::ListKeysReq,
        Self::ListKeysResp,
        Self::GetBucketReq,
        Self::GetBucketResp,
        Self::SetBucketReq,
        Self::SetBucketResp,
        Self::MapRedReq,
        Self::MapRedResp,
    ];

    /// Convert message code to its wire byte
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look up a code by its wire byte
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < MESSAGE_CODE_COUNT {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// Look up a code by its symbolic name.
    ///
    /// # Errors
    /// Returns `ProtocolError::UnknownOperation` when `name` is not in the table.
    pub fn from_name(name: &str) -> ProtocolResult<Self> {
        let code = match name {
            "ErrorResp" => Self::ErrorResp,
            "PingReq" => Self::PingReq,
            "PingResp" => Self::PingResp,
            "GetClientIdReq" => Self::GetClientIdReq,
            "GetClientIdResp" => Self::GetClientIdResp,
            "SetClientIdReq" => Self::SetClientIdReq,
            "SetClientIdResp" => Self::SetClientIdResp,
            "GetServerInfoReq" => Self::GetServerInfoReq,
            "GetServerInfoResp" => Self::GetServerInfoResp,
            "GetReq" => Self::GetReq,
            "GetResp" => Self::GetResp,
            "PutReq" => Self::PutReq,
            "PutResp" => Self::PutResp,
            "DelReq" => Self::DelReq,
            "DelResp" => Self::DelResp,
            "ListBucketsReq" => Self::ListBucketsReq,
            "ListBucketsResp" => Self::ListBucketsResp,
            "ListKeysReq" => Self::ListKeysReq,
            "ListKeysResp" => Self::ListKeysResp,
            "GetBucketReq" => Self::GetBucketReq,
            "GetBucketResp" => Self::GetBucketResp,
            "SetBucketReq" => Self::SetBucketReq,
            "SetBucketResp" => Self::SetBucketResp,
            "MapRedReq" => Self::MapRedReq,
            "MapRedResp" => Self::MapRedResp,
            _ => return Err(ProtocolError::UnknownOperation(name.to_string())),
        };
        Ok(code)
    }

    /// Get the symbolic name used by the server's enumeration
    pub const fn name(self) -> &'static str {
        match self {
            Self::ErrorResp => "ErrorResp",
            Self::PingReq => "PingReq",
            Self::PingResp => "PingResp",
            Self::GetClientIdReq => "GetClientIdReq",
            Self::GetClientIdResp => "GetClientIdResp",
            Self::SetClientIdReq => "SetClientIdReq",
            Self::SetClientIdResp => "SetClientIdResp",
            Self::GetServerInfoReq => "GetServerInfoReq",
            Self::GetServerInfoResp => "GetServerInfoResp",
            Self::GetReq => "GetReq",
            Self::GetResp => "GetResp",
            Self::PutReq => "PutReq",
            Self::PutResp => "PutResp",
            Self::DelReq => "DelReq",
            Self::DelResp => "DelResp",
            Self::ListBucketsReq => "ListBucketsReq",
            Self::ListBucketsResp => "ListBucketsResp",
            Self::ListKeysReq => "ListKeysReq",
            Self::ListKeysResp => "ListKeysResp",
            Self::GetBucketReq => "GetBucketReq",
            Self::GetBucketResp => "GetBucketResp",
            Self::SetBucketReq => "SetBucketReq",
            Self::SetBucketResp => "SetBucketResp",
            Self::MapRedReq => "MapRedReq",
            Self::MapRedResp => "MapRedResp",
        }
    }

    /// Check if the code names a request (client to server)
    pub const fn is_request(self) -> bool {
        // ErrorResp sits at 0, so every request has an odd code.
        self.as_u8() % 2 == 1
    }

    /// Check if the code names a response (server to client)
    pub const fn is_response(self) -> bool {
        !self.is_request()
    }

    /// The response code a server sends for a successful request.
    ///
    /// Returns `None` for response codes.
    pub const fn response_code(self) -> Option<Self> {
        if self.is_request() {
            Self::from_u8(self.as_u8() + 1)
        } else {
            None
        }
    }
}

/// Code of a symbolic operation name, or `UnknownOperation`.
pub fn code_of(name: &str) -> ProtocolResult<u8> {
    MessageCode::from_name(name).map(MessageCode::as_u8)
}

/// Name of a wire code, or `UnknownCode`.
pub fn name_of(code: u8) -> ProtocolResult<&'static str> {
    MessageCode::from_u8(code)
        .map(MessageCode::name)
        .ok_or(ProtocolError::UnknownCode(code))
}

impl TryFrom<u8> for MessageCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> ProtocolResult<Self> {
        Self::from_u8(value).ok_or(ProtocolError::UnknownCode(value))
    }
}

impl FromStr for MessageCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_ORDER: [&str; MESSAGE_CODE_COUNT] = [
        "ErrorResp",
        "PingReq",
        "PingResp",
        "GetClientIdReq",
        "GetClientIdResp",
        "SetClientIdReq",
        "SetClientIdResp",
        "GetServerInfoReq",
        "GetServerInfoResp",
        "GetReq",
        "GetResp",
        "PutReq",
        "PutResp",
        "DelReq",
        "DelResp",
        "ListBucketsReq",
        "ListBucketsResp",
        "ListKeysReq",
        "ListKeysResp",
        "GetBucketReq",
        "GetBucketResp",
        "SetBucketReq",
        "SetBucketResp",
        "MapRedReq",
        "MapRedResp",
    ];

    #[test]
    fn test_table_matches_server_order() {
        for (position, name) in SERVER_ORDER.iter().enumerate() {
            assert_eq!(code_of(name).unwrap() as usize, position, "{name}");
            assert_eq!(MessageCode::ALL[position].name(), *name);
        }
    }

    #[test]
    fn test_name_code_round_trip() {
        for name in SERVER_ORDER {
            let code = code_of(name).unwrap();
            assert_eq!(code_of(name_of(code).unwrap()).unwrap(), code);
        }
    }

    #[test]
    fn test_code_conversion() {
        for code in MessageCode::ALL {
            assert_eq!(MessageCode::from_u8(code.as_u8()), Some(code));
            assert_eq!(MessageCode::try_from(code.as_u8()).unwrap(), code);
        }
    }

    #[test]
    fn test_unknown_operation() {
        assert_eq!(
            code_of("FooReq"),
            Err(ProtocolError::UnknownOperation("FooReq".to_string()))
        );
        // Names are case sensitive.
        assert!(MessageCode::from_name("pingreq").is_err());
        assert!("PingReq".parse::<MessageCode>().is_ok());
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(MessageCode::from_u8(25), None);
        assert_eq!(MessageCode::from_u8(255), None);
        assert_eq!(name_of(99), Err(ProtocolError::UnknownCode(99)));
    }

    #[test]
    fn test_request_response_pairs() {
        assert!(MessageCode::ErrorResp.is_response());
        assert!(MessageCode::PingReq.is_request());
        assert_eq!(MessageCode::PingReq.response_code(), Some(MessageCode::PingResp));
        assert_eq!(
            MessageCode::ListBucketsReq.response_code(),
            Some(MessageCode::ListBucketsResp)
        );
        assert_eq!(MessageCode::MapRedReq.response_code(), Some(MessageCode::MapRedResp));
        assert_eq!(MessageCode::GetResp.response_code(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", MessageCode::GetServerInfoReq), "GetServerInfoReq");
    }
}
