use tracing::{debug, trace, warn};
use whipwire_command::{Command, CommandRecord};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stats::{TransportStats, MAX_DATAGRAM};
use crate::udp::{UdpReceiver, UdpSender};

#[cfg(unix)]
use crate::uds::{UnixDatagramReceiver, UnixDatagramSender};

/// Producer side: sends one JSON record per command.
pub struct CommandSender {
    inner: SenderInner,
    endpoint: Endpoint,
}

enum SenderInner {
    Udp(UdpSender),
    #[cfg(unix)]
    Unix(UnixDatagramSender),
}

impl CommandSender {
    /// Open a sender for `endpoint`. The receiver need not be listening yet.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let inner = match endpoint {
            Endpoint::Udp(addr) => SenderInner::Udp(UdpSender::connect(*addr)?),
            #[cfg(unix)]
            Endpoint::Unix(path) => SenderInner::Unix(UnixDatagramSender::connect(path)?),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(TransportError::Unsupported("unix")),
        };
        Ok(Self {
            inner,
            endpoint: endpoint.clone(),
        })
    }

    /// Send a command.
    ///
    /// Returns `Ok(false)` for commands that are never transported (unknown
    /// tags and diagnostics). Send failures are returned and not retried.
    pub fn send(&mut self, cmd: &Command) -> Result<bool> {
        let Ok(record) = CommandRecord::try_from(cmd) else {
            trace!(command = cmd.name(), "not transported");
            return Ok(false);
        };
        let datagram = record.to_json()?;
        self.send_raw(&datagram)?;
        Ok(true)
    }

    /// Send an already encoded datagram.
    pub fn send_raw(&mut self, datagram: &[u8]) -> Result<()> {
        if datagram.len() > MAX_DATAGRAM {
            return Err(TransportError::DatagramTooLarge {
                size: datagram.len(),
                max: MAX_DATAGRAM,
            });
        }
        match &mut self.inner {
            SenderInner::Udp(sender) => sender.send(datagram),
            #[cfg(unix)]
            SenderInner::Unix(sender) => sender.send(datagram),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn stats(&self) -> TransportStats {
        match &self.inner {
            SenderInner::Udp(sender) => *sender.stats(),
            #[cfg(unix)]
            SenderInner::Unix(sender) => *sender.stats(),
        }
    }
}

/// Receiver limits.
///
/// A render tick does not empty the socket unconditionally: it takes at most
/// `max_per_drain` datagrams, and anything beyond that stays queued in the
/// kernel buffer for the next tick. This keeps one burst from stalling a
/// frame, at the cost of applying the burst over several ticks.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Upper bound on datagrams taken by one [`CommandReceiver::drain`] call.
    /// Datagrams past the bound are left for the next call, not dropped.
    pub max_per_drain: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_per_drain: 1024,
        }
    }
}

/// Consumer side: drains pending records without blocking.
pub struct CommandReceiver {
    inner: ReceiverInner,
    endpoint: Endpoint,
    config: ReceiverConfig,
    malformed: u64,
}

enum ReceiverInner {
    Udp(UdpReceiver),
    #[cfg(unix)]
    Unix(UnixDatagramReceiver),
}

impl CommandReceiver {
    /// Bind `endpoint` with default limits.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_config(endpoint, ReceiverConfig::default())
    }

    /// Bind `endpoint` with explicit limits.
    pub fn bind_with_config(endpoint: &Endpoint, config: ReceiverConfig) -> Result<Self> {
        let (inner, endpoint) = match endpoint {
            Endpoint::Udp(addr) => {
                let receiver = UdpReceiver::bind(*addr)?;
                let bound = Endpoint::Udp(receiver.local_addr());
                (ReceiverInner::Udp(receiver), bound)
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => (
                ReceiverInner::Unix(UnixDatagramReceiver::bind(path)?),
                endpoint.clone(),
            ),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(TransportError::Unsupported("unix")),
        };
        Ok(Self {
            inner,
            endpoint,
            config,
            malformed: 0,
        })
    }

    /// The bound endpoint (with the real port when bound to UDP port 0).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Take one pending command, skipping malformed datagrams.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    pub fn try_recv(&mut self) -> Result<Option<Command>> {
        loop {
            let datagram = match &mut self.inner {
                ReceiverInner::Udp(receiver) => receiver.try_recv()?,
                #[cfg(unix)]
                ReceiverInner::Unix(receiver) => receiver.try_recv()?,
            };
            let Some(datagram) = datagram else {
                return Ok(None);
            };
            match CommandRecord::from_json(datagram) {
                Ok(record) => return Ok(Some(record.into())),
                Err(err) => {
                    self.malformed += 1;
                    debug!(error = %err, "dropping malformed datagram");
                }
            }
        }
    }

    /// Take every pending command in arrival order, up to the configured bound.
    ///
    /// Receive errors end the drain early; they are logged and the commands
    /// gathered so far are returned.
    pub fn drain(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        while commands.len() < self.config.max_per_drain {
            match self.try_recv() {
                Ok(Some(cmd)) => commands.push(cmd),
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, endpoint = %self.endpoint, "receive failed");
                    break;
                }
            }
        }
        commands
    }

    /// Datagrams that were not valid command records.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn stats(&self) -> TransportStats {
        match &self.inner {
            ReceiverInner::Udp(receiver) => *receiver.stats(),
            #[cfg(unix)]
            ReceiverInner::Unix(receiver) => *receiver.stats(),
        }
    }
}
