//! # Blocking Client API
//!
//! Purpose: Expose a compact, blocking API for issuing envelope requests over
//! one persistent connection with endpoint failover.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `PbClient` hides connection and framing details.
//! 2. **Borrow-Friendly API**: Request bodies are taken as `&[u8]`.
//! 3. **Fail Fast**: Protocol violations surface immediately as errors.
//! 4. **Explicit Recovery**: I/O failures poison the connection; the caller
//!    decides when to `reset()` and retry.

use std::time::Duration;

use rpb_common::{Envelope, MessageCode, ProtocolError, DEFAULT_MAX_FRAME_LEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{ConnectionManager, ConnectionPhase, ConnectionSettings};
use crate::dispatch::SimpleOperation;
use crate::endpoint::{Endpoint, EndpointPool, SharedEndpoint};
use crate::framer::{RawDecoder, ResponseDecoder};

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while reading/writing on an open connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or code table violation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No endpoint could be reached and the pool had no replacement left.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        source: std::io::Error,
    },

    /// Failover gave up after trying the configured number of replacements.
    #[error("failover gave up after {hops} hops; last endpoint {endpoint}")]
    FailoverLimit { hops: usize, endpoint: Endpoint },

    /// The connection failed earlier and has not been reset.
    #[error("connection failed; reset required before reuse")]
    ResetRequired,

    /// Response code did not match the expected response.
    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: MessageCode,
        actual: MessageCode,
    },

    /// Address could not be parsed into a host and port.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration document could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the error came from the socket after it was connected.
    pub fn is_io(&self) -> bool {
        matches!(self, ClientError::Io(_))
    }

    /// Whether the connection can no longer be trusted to sit on a frame
    /// boundary after this error.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Protocol(ProtocolError::FrameTooLarge { .. })
        )
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Protocol buffers port.
    pub pb_port: u16,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Replacement endpoints tried before a connect attempt gives up.
    pub max_failover_hops: usize,
    /// Largest response frame accepted, in bytes.
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            pb_port: 8087,
            read_timeout: None,
            write_timeout: None,
            max_failover_hops: 16,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> ClientResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.pb_port)
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            max_failover_hops: self.max_failover_hops,
            max_frame_len: self.max_frame_len,
        }
    }
}

/// Synchronous client over a single connection.
///
/// Each call writes one request and reads its response before returning; no
/// pipelining. Not `Sync`-safe by contract: use one client per thread.
pub struct PbClient<P, D = RawDecoder> {
    manager: ConnectionManager<P>,
    decoder: D,
}

impl<P: EndpointPool> PbClient<P, RawDecoder> {
    /// Creates a client that returns raw response envelopes.
    pub fn new(config: &ClientConfig, pool: P) -> Self {
        Self::with_decoder(config, pool, RawDecoder)
    }

    /// Runs a raw exchange and returns the envelope untouched.
    pub fn exchange(&mut self, request: &Envelope) -> ClientResult<Envelope> {
        self.request(request.code, &request.body)
    }
}

impl<P: EndpointPool, D: ResponseDecoder> PbClient<P, D> {
    /// Creates a client with a custom response decoder.
    pub fn with_decoder(config: &ClientConfig, pool: P, decoder: D) -> Self {
        let endpoint = SharedEndpoint::new(config.endpoint());
        Self::with_shared_endpoint(endpoint, config.connection_settings(), pool, decoder)
    }

    /// Creates a client around an endpoint record the caller already shares.
    pub fn with_shared_endpoint(
        endpoint: SharedEndpoint,
        settings: ConnectionSettings,
        pool: P,
        decoder: D,
    ) -> Self {
        PbClient {
            manager: ConnectionManager::new(endpoint, pool, settings),
            decoder,
        }
    }

    /// Pings the server.
    pub fn ping(&mut self) -> ClientResult<D::Response> {
        self.invoke(SimpleOperation::Ping)
    }

    /// Fetches the client id the server assigned to this connection.
    pub fn get_client_id(&mut self) -> ClientResult<D::Response> {
        self.invoke(SimpleOperation::GetClientId)
    }

    /// Fetches node name and server version.
    pub fn server_info(&mut self) -> ClientResult<D::Response> {
        self.invoke(SimpleOperation::ServerInfo)
    }

    /// Lists all buckets.
    pub fn list_buckets(&mut self) -> ClientResult<D::Response> {
        self.invoke(SimpleOperation::ListBuckets)
    }

    /// Runs a body-less operation: empty request, decoded response.
    pub fn invoke(&mut self, op: SimpleOperation) -> ClientResult<D::Response> {
        self.request(op.request_code(), &[])
    }

    /// Runs a body-less operation looked up by name, e.g. `"server_info"`.
    pub fn invoke_by_name(&mut self, name: &str) -> ClientResult<D::Response> {
        let op = SimpleOperation::from_name(name)?;
        self.invoke(op)
    }

    /// Writes one request envelope and decodes the response.
    ///
    /// I/O failures and oversized frames close the connection; call
    /// `reset()` before retrying.
    pub fn request(&mut self, code: MessageCode, body: &[u8]) -> ClientResult<D::Response> {
        let conn = self.manager.socket()?;
        let result = match conn.write_request(code, body) {
            Ok(()) => conn.read_response(&self.decoder),
            Err(err) => Err(err),
        };
        if matches!(result, Err(ref err) if err.breaks_connection()) {
            self.manager.mark_failed();
        }
        result
    }

    /// Closes the connection; the next request reconnects.
    pub fn reset(&mut self) {
        self.manager.reset();
    }

    /// Current endpoint, including any failover rewrite.
    pub fn endpoint(&self) -> Endpoint {
        self.manager.endpoint().get()
    }

    /// Shared endpoint record, for callers that want to observe failover.
    pub fn shared_endpoint(&self) -> SharedEndpoint {
        self.manager.endpoint().clone()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.manager.phase()
    }

    pub fn connection_manager(&mut self) -> &mut ConnectionManager<P> {
        &mut self.manager
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint(), Endpoint::new("127.0.0.1", 8087));
        assert_eq!(config.max_failover_hops, 16);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config = ClientConfig::from_json(r#"{"host": "db1", "pb_port": 10017}"#).unwrap();
        assert_eq!(config.endpoint(), Endpoint::new("db1", 10017));
        assert_eq!(config.max_failover_hops, 16);

        let config = ClientConfig::from_json(
            r#"{"read_timeout": {"secs": 5, "nanos": 0}, "max_failover_hops": 3,
                "max_frame_len": 4096}"#,
        )
        .unwrap();
        assert_eq!(config.read_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.connection_settings().max_failover_hops, 3);
        assert_eq!(config.connection_settings().max_frame_len, 4096);
    }

    #[test]
    fn errors_that_break_the_connection() {
        let io = ClientError::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(io.breaks_connection());
        let oversized = ClientError::from(ProtocolError::FrameTooLarge { len: 10, max: 4 });
        assert!(oversized.breaks_connection());
        // The whole frame was consumed, so the stream is still aligned.
        assert!(!ClientError::from(ProtocolError::UnknownCode(99)).breaks_connection());
        assert!(!ClientError::ResetRequired.breaks_connection());
    }

    #[test]
    fn config_rejects_bad_json() {
        let err = ClientConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn error_display() {
        let err = ClientError::Connect {
            endpoint: Endpoint::new("db1", 8087),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        };
        assert_eq!(err.to_string(), "failed to connect to db1:8087: timed out");

        let err = ClientError::from(ProtocolError::UnknownOperation("nope".into()));
        assert_eq!(err.to_string(), "protocol error: unknown operation: nope");
    }
}
