//! # Simple Operations
//!
//! Operations that send no request body and return a generic response are
//! described by one table row each: `(operation name, request code)`. The
//! client runs all of them through the same exchange (empty envelope out,
//! decoded envelope back), so adding another body-less operation only needs a
//! new row and variant.

use std::fmt;
use std::str::FromStr;

use rpb_common::{MessageCode, ProtocolError, ProtocolResult};

/// Body-less operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleOperation {
    Ping,
    GetClientId,
    ServerInfo,
    ListBuckets,
}

/// Operation table: name, variant, request code.
const SIMPLE_OPERATIONS: [(&str, SimpleOperation, MessageCode); 4] = [
    ("ping", SimpleOperation::Ping, MessageCode::PingReq),
    ("get_client_id", SimpleOperation::GetClientId, MessageCode::GetClientIdReq),
    ("server_info", SimpleOperation::ServerInfo, MessageCode::GetServerInfoReq),
    ("list_buckets", SimpleOperation::ListBuckets, MessageCode::ListBucketsReq),
];

impl SimpleOperation {
    /// All simple operations in table order.
    pub const ALL: [SimpleOperation; 4] = [
        Self::Ping,
        Self::GetClientId,
        Self::ServerInfo,
        Self::ListBuckets,
    ];

    const fn row(self) -> (&'static str, SimpleOperation, MessageCode) {
        SIMPLE_OPERATIONS[self as usize]
    }

    /// Operation name as exposed to callers, e.g. `"server_info"`.
    pub const fn name(self) -> &'static str {
        self.row().0
    }

    /// Code written in the request envelope.
    pub const fn request_code(self) -> MessageCode {
        self.row().2
    }

    /// Looks up an operation by name.
    ///
    /// # Errors
    /// Returns `ProtocolError::UnknownOperation` for names not in the table.
    pub fn from_name(name: &str) -> ProtocolResult<Self> {
        SIMPLE_OPERATIONS
            .iter()
            .find(|(op_name, _, _)| *op_name == name)
            .map(|(_, op, _)| *op)
            .ok_or_else(|| ProtocolError::UnknownOperation(name.to_string()))
    }
}

impl FromStr for SimpleOperation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for SimpleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
