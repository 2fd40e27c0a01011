//! # Proxy Pool
//!
//! Round-robin rotation over a fixed list of authenticated egress proxies.
//!
//! The list is parsed once at startup from `host:port:user:pass` lines and never
//! changes afterwards. The cursor advances on every `next()` call, whether or
//! not the caller ends up sending a request through the returned proxy.
//!
//! The cursor is an `AtomicUsize` so the pool can be shared by reference between
//! the availability and claim clients without a lock.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ConfigError;

/// One egress proxy.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyDescriptor {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ProxyDescriptor {
    /// Parses a `host:port:user:pass` descriptor. `index` is only used for error reporting.
    pub fn parse(line: &str, index: usize) -> Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedProxy { index, reason: reason.to_string() };

        let parts: Vec<&str> = line.trim().split(':').collect();
        let [host, port, username, password] = parts.as_slice() else {
            return Err(malformed("expected host:port:user:pass"));
        };
        if host.is_empty() {
            return Err(malformed("empty host"));
        }
        let port = port.parse::<u16>().map_err(|_| malformed("port is not a number in 0-65535"))?;

        Ok(Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// `http://host:port`, without credentials.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

// Keep passwords out of logs.
impl fmt::Debug for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"*****")
            .finish()
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Immutable proxy list plus a rotating cursor.
#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: Vec<ProxyDescriptor>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    pub fn new(proxies: Vec<ProxyDescriptor>) -> Self {
        Self { proxies, cursor: AtomicUsize::new(0) }
    }

    /// A pool that always yields `None` (direct egress).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses one descriptor per item. Blank items and `#` comments are skipped.
    /// Any malformed descriptor fails the whole list.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let proxies = lines
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .enumerate()
            .map(|(i, l)| ProxyDescriptor::parse(l, i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(proxies))
    }

    /// Reads a proxy list file, one descriptor per line.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::ProxyFile { path: path.to_path_buf(), source })?;
        Self::parse(content.lines())
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn proxies(&self) -> &[ProxyDescriptor] {
        &self.proxies
    }

    /// Next proxy in round-robin order, or `None` when the pool is empty.
    pub fn next(&self) -> Option<ProxyDescriptor> {
        if self.proxies.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
        Some(self.proxies[i].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_descriptor() {
        let p = ProxyDescriptor::parse("10.0.0.1:8080:bob:s3cret", 0).unwrap();
        assert_eq!(p.host, "10.0.0.1");
        assert_eq!(p.port, 8080);
        assert_eq!(p.username, "bob");
        assert_eq!(p.password, "s3cret");
        assert_eq!(p.endpoint(), "http://10.0.0.1:8080");
        assert!(!format!("{p:?}").contains("s3cret"));
    }

    #[test]
    fn malformed_descriptors_fail_the_list() {
        for bad in ["host:80:user", "host:eighty:user:pass", ":80:user:pass", "a:1:b:c:d"] {
            assert!(ProxyPool::parse([bad]).is_err(), "{bad} should be rejected");
        }
        let err = ProxyPool::parse(["h:1:u:p", "broken"]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedProxy { index: 1, .. }));
    }

    #[test]
    fn empty_pool_yields_none() {
        let pool = ProxyPool::parse(["", "# nothing here"]).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.next(), None);
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn rotation_is_round_robin_and_balanced() {
        let pool = ProxyPool::parse(["a:1:u:p", "b:2:u:p", "c:3:u:p"]).unwrap();
        let k = pool.len();

        for n in [0usize, 1, 2, 3, 7, 10, 31] {
            let pool = ProxyPool::new(pool.proxies().to_vec());
            let visited: Vec<String> = (0..n).map(|_| pool.next().unwrap().host).collect();

            for (i, host) in visited.iter().enumerate() {
                assert_eq!(host, &pool.proxies()[i % k].host);
            }
            for proxy in pool.proxies() {
                let count = visited.iter().filter(|h| **h == proxy.host).count();
                assert!(count == n / k || count == n.div_ceil(k), "n={n} host={} count={count}", proxy.host);
            }
        }
    }
}
