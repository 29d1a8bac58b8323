//! Best-effort transport of visualizer commands from the serial-side
//! producer to the renderer process.
//!
//! One [`CommandRecord`](whipwire_command::CommandRecord) travels as one JSON
//! datagram over either:
//! - UDP (`udp://HOST:PORT`, the default endpoint)
//! - Unix datagram sockets (`unix://PATH`, Linux/macOS)
//!
//! Delivery is at-most-once with no retries and no backpressure. The
//! receiver never blocks; it drains whatever is pending each tick.

pub mod endpoint;
pub mod error;
pub mod link;
pub mod stats;
pub mod udp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, DEFAULT_ENDPOINT, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use link::{CommandReceiver, CommandSender, ReceiverConfig};
pub use stats::{TransportStats, MAX_DATAGRAM};
pub use udp::{UdpReceiver, UdpSender};

#[cfg(unix)]
pub use uds::{UnixDatagramReceiver, UnixDatagramSender};
