use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stats::{TransportStats, MAX_DATAGRAM};

/// Non-blocking UDP datagram receiver.
pub struct UdpReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
    // One spare byte so an oversized datagram is detected instead of truncated.
    recv_buffer: Box<[u8; MAX_DATAGRAM + 1]>,
    stats: TransportStats,
}

impl UdpReceiver {
    /// Bind to `addr` in non-blocking mode. Port 0 picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            endpoint: format!("udp://{addr}"),
            source,
        };
        let socket = UdpSocket::bind(addr).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;

        info!(%local_addr, "listening on udp");

        Ok(Self {
            socket,
            local_addr,
            recv_buffer: Box::new([0u8; MAX_DATAGRAM + 1]),
            stats: TransportStats::default(),
        })
    }

    /// The bound address (with the real port when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive one datagram if one is pending.
    pub fn try_recv(&mut self) -> Result<Option<&[u8]>> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer[..]) {
                Ok((len, from)) if len > MAX_DATAGRAM => {
                    self.stats.oversized += 1;
                    debug!(%from, "dropping oversized datagram");
                }
                Ok((len, _from)) => {
                    self.stats.record_recv(len);
                    return Ok(Some(&self.recv_buffer[..len]));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.stats.recv_errors += 1;
                    return Err(e.into());
                }
            }
        }
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

/// Fire-and-forget UDP datagram sender.
pub struct UdpSender {
    socket: UdpSocket,
    peer: SocketAddr,
    stats: TransportStats,
}

impl UdpSender {
    /// Open an ephemeral socket of the peer's address family.
    pub fn connect(peer: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Connect {
            endpoint: format!("udp://{peer}"),
            source,
        })?;
        debug!(%peer, "udp sender ready");
        Ok(Self {
            socket,
            peer,
            stats: TransportStats::default(),
        })
    }

    /// Send one datagram. Nothing is retried.
    pub fn send(&mut self, datagram: &[u8]) -> Result<()> {
        let result = self.socket.send_to(datagram, self.peer);
        self.stats.record_send(&result);
        result?;
        Ok(())
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}
