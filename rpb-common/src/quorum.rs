//! # Quorum Values
//!
//! Replica counts (`r`, `w`, `dw`, `rw`, ...) travel as `u32`. Symbolic
//! consistency levels are encoded as reserved sentinels just below
//! `u32::MAX`, far above any realistic replica count:
//!
//! ```text
//! one     = u32::MAX - 1  (0xFFFF_FFFE)
//! quorum  = u32::MAX - 2  (0xFFFF_FFFD)
//! all     = u32::MAX - 3  (0xFFFF_FFFC)
//! default = u32::MAX - 4  (0xFFFF_FFFB)
//! ```
//!
//! Normalization is lenient: anything that is neither a known
//! symbol nor a number becomes 0. Callers validate semantics upstream.

use std::fmt;

/// Sentinel for a single replica.
pub const QUORUM_ONE: u32 = u32::MAX - 1;
/// Sentinel for a majority of replicas.
pub const QUORUM_QUORUM: u32 = u32::MAX - 2;
/// Sentinel for every replica.
pub const QUORUM_ALL: u32 = u32::MAX - 3;
/// Sentinel for the bucket's configured default.
pub const QUORUM_DEFAULT: u32 = u32::MAX - 4;

/// Symbolic names and their sentinels.
pub const QUORUM_SENTINELS: [(&str, u32); 4] = [
    ("one", QUORUM_ONE),
    ("quorum", QUORUM_QUORUM),
    ("all", QUORUM_ALL),
    ("default", QUORUM_DEFAULT),
];

/// Typed quorum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuorumValue {
    One,
    Quorum,
    All,
    Default,
    /// Explicit replica count.
    Count(u32),
}

impl QuorumValue {
    /// Wire representation of the value.
    pub const fn as_wire(self) -> u32 {
        match self {
            Self::One => QUORUM_ONE,
            Self::Quorum => QUORUM_QUORUM,
            Self::All => QUORUM_ALL,
            Self::Default => QUORUM_DEFAULT,
            Self::Count(count) => count,
        }
    }

    /// Maps a wire value back, treating sentinels as symbols.
    pub const fn from_wire(value: u32) -> Self {
        match value {
            QUORUM_ONE => Self::One,
            QUORUM_QUORUM => Self::Quorum,
            QUORUM_ALL => Self::All,
            QUORUM_DEFAULT => Self::Default,
            count => Self::Count(count),
        }
    }

    /// Parses the same inputs as [`normalize_quorum`].
    pub fn parse(value: &str) -> Self {
        Self::from_wire(normalize_str(value))
    }
}

impl fmt::Display for QuorumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "one"),
            Self::Quorum => write!(f, "quorum"),
            Self::All => write!(f, "all"),
            Self::Default => write!(f, "default"),
            Self::Count(count) => write!(f, "{count}"),
        }
    }
}

impl From<QuorumValue> for u32 {
    fn from(value: QuorumValue) -> u32 {
        value.as_wire()
    }
}

/// Normalizes a quorum value to its wire integer.
///
/// The value's string form is matched against the sentinel names first and
/// otherwise coerced to an integer (`"3"` is 3, `"abc"` is 0).
///
/// # Examples
/// ```rust
/// use rpb_common::{normalize_quorum, QUORUM_ALL};
///
/// assert_eq!(normalize_quorum("all"), QUORUM_ALL);
/// assert_eq!(normalize_quorum(3), 3);
/// assert_eq!(normalize_quorum("abc"), 0);
/// ```
pub fn normalize_quorum(value: impl fmt::Display) -> u32 {
    normalize_str(&value.to_string())
}

fn normalize_str(value: &str) -> u32 {
    QUORUM_SENTINELS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, sentinel)| *sentinel)
        .unwrap_or_else(|| coerce_integer(value))
}

/// Leading-integer coercion: optional whitespace and sign, then digits.
///
/// A single `_` between two digits groups them (`"1_000"` is 1000); anything
/// else after the leading digits is ignored. Results are clamped into the
/// `u32` range, so negative input becomes 0.
fn coerce_integer(value: &str) -> u32 {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let bytes = digits.as_bytes();
    let mut parsed: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let grouped = i > 0
                && bytes[i - 1].is_ascii_digit()
                && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
            if grouped {
                continue;
            }
            break;
        }
        if !b.is_ascii_digit() {
            break;
        }
        parsed = parsed
            .saturating_mul(10)
            .saturating_add(u64::from(b - b'0'));
    }

    if negative {
        0
    } else {
        parsed.min(u64::from(u32::MAX)) as u32
    }
}
