//! # Endpoints and Failover Pools
//!
//! Purpose: Describe where the client connects and where it may fail over to.
//!
//! ## Design Principles
//! 1. **Shared Record**: The active endpoint lives in one `SharedEndpoint`;
//!    the caller keeps a clone and sees failover rewrites through it.
//! 2. **Single Writer**: Only the connection manager replaces the endpoint.
//! 3. **Strategy Pattern**: Failover candidates come from an `EndpointPool`
//!    trait object or generic, so health tracking stays outside this crate.
//! 4. **Finite Pools**: The bundled pool drains, which bounds failover.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ClientResult};

/// A `(host, port)` pair identifying one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// Resolves the endpoint to socket addresses.
    pub fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }

    /// Resolves the endpoint, giving up with `TimedOut` after `timeout`.
    ///
    /// IP literals resolve inline. Host names are looked up on a helper
    /// thread; a lookup that outlives the timeout finishes in the background
    /// and its result is dropped.
    pub fn resolve_within(&self, timeout: Duration) -> io::Result<Vec<SocketAddr>> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, self.port)]);
        }

        let (tx, rx) = mpsc::channel();
        let target = self.clone();
        thread::Builder::new()
            .name("rpb-resolve".to_string())
            .spawn(move || {
                // The receiver is gone if the caller already timed out.
                let _ = tx.send(target.resolve());
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("resolving {} timed out", self),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("resolver for {} exited without an answer", self),
            )),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = ClientError;

    /// Parses `host:port`; bracketed IPv6 hosts (`[::1]:8087`) are accepted.
    fn from_str(s: &str) -> ClientResult<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClientError::InvalidAddress(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ClientError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| ClientError::InvalidAddress(s.to_string()))?;
        Ok(Endpoint::new(host, port))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::new(addr.ip().to_string(), addr.port())
    }
}

/// Endpoint record shared between the caller and the connection manager.
///
/// Cloning shares the record; it does not copy the endpoint.
#[derive(Debug, Clone)]
pub struct SharedEndpoint {
    inner: Arc<Mutex<Endpoint>>,
}

impl SharedEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        SharedEndpoint {
            inner: Arc::new(Mutex::new(endpoint)),
        }
    }

    /// Snapshot of the current endpoint.
    pub fn get(&self) -> Endpoint {
        self.inner.lock().clone()
    }

    pub fn host(&self) -> String {
        self.inner.lock().host.clone()
    }

    pub fn port(&self) -> u16 {
        self.inner.lock().port
    }

    /// Overwrites the endpoint in place. Failover is the only caller.
    pub(crate) fn replace(&self, endpoint: Endpoint) -> Endpoint {
        std::mem::replace(&mut *self.inner.lock(), endpoint)
    }
}

impl From<Endpoint> for SharedEndpoint {
    fn from(endpoint: Endpoint) -> Self {
        SharedEndpoint::new(endpoint)
    }
}

/// Source of replacement endpoints and sink for unhealthy ones.
///
/// Implementations are expected to be finite: once no healthy candidate is
/// left, `next_endpoint` must return `None`.
pub trait EndpointPool {
    /// Records that `host:port` could not be reached.
    fn blacklist(&self, host: &str, port: u16);

    /// Returns the next candidate, or `None` when the pool is exhausted.
    fn next_endpoint(&self) -> Option<Endpoint>;
}

impl<P: EndpointPool + ?Sized> EndpointPool for &P {
    fn blacklist(&self, host: &str, port: u16) {
        (**self).blacklist(host, port)
    }

    fn next_endpoint(&self) -> Option<Endpoint> {
        (**self).next_endpoint()
    }
}

impl<P: EndpointPool + ?Sized> EndpointPool for Arc<P> {
    fn blacklist(&self, host: &str, port: u16) {
        (**self).blacklist(host, port)
    }

    fn next_endpoint(&self) -> Option<Endpoint> {
        (**self).next_endpoint()
    }
}

impl<P: EndpointPool + ?Sized> EndpointPool for Box<P> {
    fn blacklist(&self, host: &str, port: u16) {
        (**self).blacklist(host, port)
    }

    fn next_endpoint(&self) -> Option<Endpoint> {
        (**self).next_endpoint()
    }
}

struct PoolState {
    candidates: VecDeque<Endpoint>,
    blacklisted: HashSet<Endpoint>,
}

/// Fixed, ordered list of failover candidates.
///
/// Each candidate is handed out at most once; blacklisted candidates are
/// skipped.
pub struct StaticEndpointPool {
    state: Mutex<PoolState>,
}

impl StaticEndpointPool {
    pub fn new(candidates: impl IntoIterator<Item = Endpoint>) -> Self {
        StaticEndpointPool {
            state: Mutex::new(PoolState {
                candidates: candidates.into_iter().collect(),
                blacklisted: HashSet::new(),
            }),
        }
    }

    /// A pool that never offers a replacement.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_blacklisted(&self, endpoint: &Endpoint) -> bool {
        self.state.lock().blacklisted.contains(endpoint)
    }

    /// Endpoints blacklisted so far, in no particular order.
    pub fn blacklisted(&self) -> Vec<Endpoint> {
        self.state.lock().blacklisted.iter().cloned().collect()
    }

    /// Number of candidates not yet handed out.
    pub fn remaining(&self) -> usize {
        self.state.lock().candidates.len()
    }
}

impl EndpointPool for StaticEndpointPool {
    fn blacklist(&self, host: &str, port: u16) {
        self.state.lock().blacklisted.insert(Endpoint::new(host, port));
    }

    fn next_endpoint(&self) -> Option<Endpoint> {
        let mut state = self.state.lock();
        while let Some(candidate) = state.candidates.pop_front() {
            if !state.blacklisted.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let endpoint: Endpoint = "db1.local:8087".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("db1.local", 8087));

        let endpoint: Endpoint = "[::1]:10017".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("::1", 10017));
        assert_eq!(endpoint.to_string(), "[::1]:10017");
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!("nohost".parse::<Endpoint>().is_err());
        assert!(":8087".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
        assert!("host:70000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn ip_literals_resolve_inline() {
        let endpoint = Endpoint::new("127.0.0.1", 8087);
        let addrs = endpoint.resolve_within(Duration::ZERO).unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:8087".parse::<SocketAddr>().unwrap()]);

        let endpoint: Endpoint = "[::1]:10017".parse().unwrap();
        let addrs = endpoint.resolve_within(Duration::ZERO).unwrap();
        assert_eq!(addrs, vec!["[::1]:10017".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn host_names_resolve_on_helper_thread() {
        let endpoint = Endpoint::new("localhost", 8087);
        let addrs = endpoint.resolve_within(Duration::from_secs(2)).unwrap();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|addr| addr.port() == 8087 && addr.ip().is_loopback()));
    }

    #[test]
    fn shared_endpoint_is_shared() {
        let shared = SharedEndpoint::new(Endpoint::new("a", 1));
        let view = shared.clone();
        let previous = shared.replace(Endpoint::new("b", 2));
        assert_eq!(previous, Endpoint::new("a", 1));
        assert_eq!(view.get(), Endpoint::new("b", 2));
        assert_eq!(view.host(), "b");
        assert_eq!(view.port(), 2);
    }

    #[test]
    fn static_pool_drains_in_order() {
        let pool = StaticEndpointPool::new(vec![Endpoint::new("a", 1), Endpoint::new("b", 2)]);
        assert_eq!(pool.next_endpoint(), Some(Endpoint::new("a", 1)));
        assert_eq!(pool.next_endpoint(), Some(Endpoint::new("b", 2)));
        assert_eq!(pool.next_endpoint(), None);
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn static_pool_skips_blacklisted() {
        let pool = StaticEndpointPool::new(vec![Endpoint::new("a", 1), Endpoint::new("b", 2)]);
        pool.blacklist("a", 1);
        assert!(pool.is_blacklisted(&Endpoint::new("a", 1)));
        assert_eq!(pool.next_endpoint(), Some(Endpoint::new("b", 2)));
        assert_eq!(pool.next_endpoint(), None);
    }

    #[test]
    fn empty_pool_offers_nothing() {
        let pool = StaticEndpointPool::empty();
        pool.blacklist("a", 1);
        assert_eq!(pool.next_endpoint(), None);
        assert_eq!(pool.blacklisted(), vec![Endpoint::new("a", 1)]);
    }

    #[test]
    fn pool_through_arc() {
        let pool = Arc::new(StaticEndpointPool::new(vec![Endpoint::new("a", 1)]));
        let shared: Arc<dyn EndpointPool> = pool.clone();
        assert_eq!(shared.next_endpoint(), Some(Endpoint::new("a", 1)));
        assert_eq!(pool.remaining(), 0);
    }
}
