//! # Key Generation
//!
//! Client-side keys for writes that do not name one. The key is the SHA-1 of
//! `hostname + timestamp` (RFC 3339, millisecond precision) in URL-safe
//! base64 without padding.
//!
//! This approximates the server's own key scheme; it is not identical.
//! Uniqueness is probabilistic: two calls on the same host within the same
//! millisecond produce the same key.

use std::fmt::Display;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use sha1::{Digest, Sha1};

/// Generates a key from the local hostname and the current local time.
pub fn generate_key() -> String {
    let hostname = gethostname::gethostname();
    key_for(&hostname.to_string_lossy(), &Local::now())
}

/// Deterministic core of [`generate_key`].
pub fn key_for<Tz>(hostname: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, false);
    let mut hasher = Sha1::new();
    hasher.update(hostname.as_bytes());
    hasher.update(timestamp.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
