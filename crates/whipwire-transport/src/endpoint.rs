use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Default renderer port.
pub const DEFAULT_PORT: u16 = 19847;

/// Default endpoint string, as accepted by [`Endpoint::from_str`].
pub const DEFAULT_ENDPOINT: &str = "udp://127.0.0.1:19847";

/// Where the renderer listens.
///
/// Parsed from `udp://HOST:PORT` or `unix://PATH` (so `unix:///tmp/w.sock`
/// names the absolute path `/tmp/w.sock`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Udp(SocketAddr),
    Unix(PathBuf),
}

impl Endpoint {
    /// Scheme name for diagnostics.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Udp(_) => "udp",
            Self::Unix(_) => "unix",
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Udp(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::LOCALHOST,
            DEFAULT_PORT,
        )))
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(rest) = s.strip_prefix("udp://") {
            let mut addrs = rest
                .to_socket_addrs()
                .map_err(|e| invalid(&e.to_string()))?;
            return addrs
                .next()
                .map(Self::Udp)
                .ok_or_else(|| invalid("host resolved to no addresses"));
        }

        if let Some(rest) = s.strip_prefix("unix://") {
            if rest.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Self::Unix(PathBuf::from(rest)));
        }

        Err(invalid("expected udp://HOST:PORT or unix://PATH"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp(addr) => write!(f, "udp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
