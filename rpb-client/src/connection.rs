//! # Connection Manager
//!
//! Purpose: Own the single TCP connection of a client, connect it lazily with
//! a bounded wait, and fail over to a replacement endpoint when the current
//! one cannot be reached.
//!
//! ## Design Principles
//! 1. **Explicit State Machine**: `socket()` is the only call that connects;
//!    every move between phases goes through `transition`.
//! 2. **Bounded Connects**: Each endpoint gets `CONNECT_TIMEOUT` in total,
//!    covering name resolution and all of its resolved addresses.
//! 3. **Visible Failover**: The replacement endpoint is written into the
//!    caller's `SharedEndpoint`, so the caller sees where it is connected.
//! 4. **No Silent Reconnects**: An I/O failure closes the socket at once, and
//!    no new one is opened until the caller calls `reset()`.
//!
//! ## State Overview
//!
//! ```text
//!                 socket()                ok
//! Disconnected ------------> Connecting -------> Connected
//!      ^                        |                    |
//!      |   pool exhausted /     |                    | mark_failed()
//!      |   hop limit reached    |                    v
//!      +------------------------+                  Failed
//!      |                                             |
//!      +-------------------- reset() ----------------+
//! ```
//!
//! While `Connecting`, each failed attempt blacklists the endpoint, asks the
//! pool for a replacement, rewrites the shared endpoint and tries again.

use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use rpb_common::MessageCode;
use tracing::{debug, info, warn};

use crate::client::{ClientConfig, ClientError, ClientResult};
use crate::endpoint::{Endpoint, EndpointPool, SharedEndpoint};
use crate::framer::{self, ResponseDecoder};

/// Upper bound on a single endpoint's connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle phase of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No socket; the next `socket()` call connects.
    Disconnected,
    /// A connect (possibly with failover) is in progress.
    Connecting,
    /// A healthy socket is held.
    Connected,
    /// The held socket saw an I/O failure; `reset()` is required.
    Failed,
}

/// Socket tuning applied to every new connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Replacement endpoints tried before giving up.
    pub max_failover_hops: usize,
    /// Largest response frame accepted from the server.
    pub max_frame_len: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ClientConfig::default().connection_settings()
    }
}

/// Single TCP connection with a reusable write buffer.
pub struct Connection {
    // Buffered reader keeps small response reads cheap; writes bypass it.
    reader: BufReader<TcpStream>,
    write_buf: BytesMut,
    endpoint: Endpoint,
    max_frame_len: usize,
}

impl Connection {
    fn open(
        endpoint: &Endpoint,
        timeout: Duration,
        settings: &ConnectionSettings,
    ) -> io::Result<Self> {
        let stream = connect_stream(endpoint, timeout)?;
        stream.set_read_timeout(settings.read_timeout)?;
        stream.set_write_timeout(settings.write_timeout)?;
        // Disable Nagle to keep request latency low for small envelopes.
        stream.set_nodelay(true)?;

        Ok(Connection {
            reader: BufReader::new(stream),
            write_buf: BytesMut::with_capacity(256),
            endpoint: endpoint.clone(),
            max_frame_len: settings.max_frame_len,
        })
    }

    /// Endpoint this connection was opened against.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.reader.get_ref().local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.reader.get_ref().peer_addr()
    }

    /// Whether Nagle's algorithm is disabled on the socket.
    pub fn nodelay(&self) -> io::Result<bool> {
        self.reader.get_ref().nodelay()
    }

    /// Writes one request envelope.
    pub fn write_request(&mut self, code: MessageCode, body: &[u8]) -> ClientResult<()> {
        framer::write_request(self.reader.get_mut(), &mut self.write_buf, code, body)
    }

    /// Reads one response envelope and decodes it.
    pub fn read_response<D: ResponseDecoder>(&mut self, decoder: &D) -> ClientResult<D::Response> {
        framer::read_response(&mut self.reader, decoder, self.max_frame_len)
    }

    fn close(self) {
        // The peer may already be gone; dropping the stream closes it anyway.
        let _ = self.reader.get_ref().shutdown(Shutdown::Both);
    }
}

/// Owns the lazily created connection and performs endpoint failover.
///
/// Not synchronized: one manager serves one caller, one request at a time.
pub struct ConnectionManager<P> {
    endpoint: SharedEndpoint,
    pool: P,
    settings: ConnectionSettings,
    conn: Option<Connection>,
    phase: ConnectionPhase,
}

impl<P: EndpointPool> ConnectionManager<P> {
    /// Creates a disconnected manager; nothing is connected until `socket()`.
    pub fn new(endpoint: SharedEndpoint, pool: P, settings: ConnectionSettings) -> Self {
        ConnectionManager {
            endpoint,
            pool,
            settings,
            conn: None,
            phase: ConnectionPhase::Disconnected,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Shared endpoint record, rewritten on failover.
    pub fn endpoint(&self) -> &SharedEndpoint {
        &self.endpoint
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Returns the active connection, connecting first if there is none.
    ///
    /// # Errors
    /// - `ClientError::ResetRequired` when the held socket failed earlier.
    /// - `ClientError::Connect` when every endpoint offered by the pool
    ///   failed and the pool ran dry.
    /// - `ClientError::FailoverLimit` when `max_failover_hops` replacements
    ///   failed.
    pub fn socket(&mut self) -> ClientResult<&mut Connection> {
        if self.phase == ConnectionPhase::Failed {
            return Err(ClientError::ResetRequired);
        }
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.establish()?,
        };
        Ok(self.conn.insert(conn))
    }

    /// Closes the held socket after a read or write failure.
    ///
    /// The manager stays `Failed`, refusing new sockets, until `reset()`.
    pub fn mark_failed(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(endpoint = %conn.endpoint, "closing connection after I/O failure");
            conn.close();
            self.transition(ConnectionPhase::Failed);
        }
    }

    /// Closes and drops the socket, if any. Safe to call repeatedly.
    pub fn reset(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!(endpoint = %conn.endpoint, "closing connection");
            conn.close();
        }
        self.transition(ConnectionPhase::Disconnected);
    }

    fn establish(&mut self) -> ClientResult<Connection> {
        self.transition(ConnectionPhase::Connecting);
        let mut hops = 0usize;

        loop {
            let endpoint = self.endpoint.get();
            let err = match Connection::open(&endpoint, CONNECT_TIMEOUT, &self.settings) {
                Ok(conn) => {
                    info!(endpoint = %endpoint, hops, "connected");
                    self.transition(ConnectionPhase::Connected);
                    return Ok(conn);
                }
                Err(err) => err,
            };

            self.pool.blacklist(&endpoint.host, endpoint.port);

            if hops >= self.settings.max_failover_hops {
                warn!(
                    "exceeded timeout on connect to {endpoint}: {err}. \
                     Giving up after {hops} failover hops"
                );
                self.transition(ConnectionPhase::Disconnected);
                return Err(ClientError::FailoverLimit { hops, endpoint });
            }

            match self.pool.next_endpoint() {
                Some(next) => {
                    warn!(
                        "exceeded timeout on connect to {endpoint}: {err}. Server changed to {next}"
                    );
                    self.endpoint.replace(next);
                    hops += 1;
                }
                None => {
                    warn!(
                        "exceeded timeout on connect to {endpoint}: {err}. \
                         No replacement server available"
                    );
                    self.transition(ConnectionPhase::Disconnected);
                    return Err(ClientError::Connect {
                        endpoint,
                        source: err,
                    });
                }
            }
        }
    }

    fn transition(&mut self, next: ConnectionPhase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, "connection phase change");
            self.phase = next;
        }
    }
}

/// Connects to the first reachable address of `endpoint` within `timeout`.
///
/// Name resolution and every connect attempt share the one deadline.
fn connect_stream(endpoint: &Endpoint, timeout: Duration) -> io::Result<TcpStream> {
    let deadline = Instant::now() + timeout;
    let mut last_err = None;

    for addr in endpoint.resolve_within(timeout)? {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        }
        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no addresses resolved for {endpoint}"),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::StaticEndpointPool;
    use std::io::Read;
    use std::net::TcpListener;

    /// Routable address that silently drops SYNs.
    const BLACKHOLE: &str = "10.255.255.1";

    fn closed_port() -> u16 {
        closed_ports(1)[0]
    }

    fn closed_ports(count: usize) -> Vec<u16> {
        // Hold every listener until all ports are picked so none repeats.
        let listeners: Vec<TcpListener> = (0..count)
            .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        listeners.iter().map(|l| l.local_addr().unwrap().port()).collect()
    }

    fn manager(port: u16, pool: StaticEndpointPool) -> ConnectionManager<StaticEndpointPool> {
        ConnectionManager::new(
            SharedEndpoint::new(Endpoint::new("127.0.0.1", port)),
            pool,
            ConnectionSettings::default(),
        )
    }

    #[test]
    fn starts_disconnected() {
        let manager = manager(closed_port(), StaticEndpointPool::empty());
        assert_eq!(manager.phase(), ConnectionPhase::Disconnected);
    }

    #[test]
    fn connects_lazily_with_nodelay() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut manager = manager(port, StaticEndpointPool::empty());

        let conn = manager.socket().unwrap();
        assert!(conn.nodelay().unwrap());
        assert_eq!(conn.peer_addr().unwrap().port(), port);
        assert_eq!(manager.phase(), ConnectionPhase::Connected);
    }

    #[test]
    fn reuses_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut manager = manager(port, StaticEndpointPool::empty());

        let first = manager.socket().unwrap().local_addr().unwrap();
        let second = manager.socket().unwrap().local_addr().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn exhausted_pool_surfaces_connect_error() {
        let port = closed_port();
        let mut manager = manager(port, StaticEndpointPool::empty());

        let err = manager.socket().err().unwrap();
        assert!(matches!(err, ClientError::Connect { ref endpoint, .. } if endpoint.port == port));
        assert_eq!(manager.phase(), ConnectionPhase::Disconnected);
        assert!(manager.pool().is_blacklisted(&Endpoint::new("127.0.0.1", port)));
        // Endpoint left untouched when no replacement exists.
        assert_eq!(manager.endpoint().port(), port);
    }

    #[test]
    fn hop_limit_stops_failover() {
        let ports = closed_ports(4);
        let alternates = ports[1..].iter().map(|p| Endpoint::new("127.0.0.1", *p));
        let pool = StaticEndpointPool::new(alternates);
        let mut manager = ConnectionManager::new(
            SharedEndpoint::new(Endpoint::new("127.0.0.1", ports[0])),
            pool,
            ConnectionSettings {
                max_failover_hops: 2,
                ..ConnectionSettings::default()
            },
        );

        let err = manager.socket().err().unwrap();
        assert!(matches!(err, ClientError::FailoverLimit { hops: 2, .. }));
        assert_eq!(manager.endpoint().port(), ports[2]);
        assert_eq!(manager.pool().remaining(), 1);
    }

    #[test]
    fn failed_socket_requires_reset() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut manager = manager(port, StaticEndpointPool::empty());

        manager.socket().unwrap();
        manager.mark_failed();
        assert_eq!(manager.phase(), ConnectionPhase::Failed);
        assert!(matches!(manager.socket().err(), Some(ClientError::ResetRequired)));

        manager.reset();
        assert_eq!(manager.phase(), ConnectionPhase::Disconnected);
        assert!(manager.socket().is_ok());
    }

    #[test]
    fn mark_failed_closes_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut manager = manager(port, StaticEndpointPool::empty());

        manager.socket().unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        manager.mark_failed();
        assert_eq!(manager.phase(), ConnectionPhase::Failed);
        let mut buf = [0u8; 1];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn connect_attempt_is_bounded_by_timeout() {
        let endpoint = Endpoint::new(BLACKHOLE, 81);
        let timeout = Duration::from_millis(300);

        let start = Instant::now();
        let err = connect_stream(&endpoint, timeout).unwrap_err();
        let elapsed = start.elapsed();

        assert!(elapsed < timeout + Duration::from_millis(500), "took {elapsed:?}");
        match err.kind() {
            io::ErrorKind::TimedOut => assert!(elapsed >= timeout / 2, "took {elapsed:?}"),
            // Without a route the connect fails before the deadline matters.
            _ => eprintln!("no route to {endpoint}, timeout not exercised: {err}"),
        }
    }

    #[test]
    fn timed_out_endpoint_fails_over() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let alternate = Endpoint::from(listener.local_addr().unwrap());
        let primary = Endpoint::new(BLACKHOLE, 81);
        let mut manager = ConnectionManager::new(
            SharedEndpoint::new(primary.clone()),
            StaticEndpointPool::new(vec![alternate.clone()]),
            ConnectionSettings::default(),
        );

        let start = Instant::now();
        let conn = manager.socket().unwrap();
        assert_eq!(conn.endpoint(), &alternate);
        assert!(start.elapsed() < CONNECT_TIMEOUT + Duration::from_secs(1));

        assert_eq!(manager.phase(), ConnectionPhase::Connected);
        assert_eq!(manager.endpoint().get(), alternate);
        assert!(manager.pool().is_blacklisted(&primary));
    }

    #[test]
    fn mark_failed_without_socket_is_noop() {
        let mut manager = manager(closed_port(), StaticEndpointPool::empty());
        manager.mark_failed();
        assert_eq!(manager.phase(), ConnectionPhase::Disconnected);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut manager = manager(closed_port(), StaticEndpointPool::empty());
        manager.reset();
        manager.reset();
        assert_eq!(manager.phase(), ConnectionPhase::Disconnected);
    }
}
