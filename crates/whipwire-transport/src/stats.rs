/// Maximum datagram size carried by the transport.
pub const MAX_DATAGRAM: usize = 4096;

/// Per-socket transport counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Datagrams sent.
    pub datagrams_sent: u64,
    /// Datagrams received.
    pub datagrams_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors (the datagram was dropped).
    pub send_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
    /// Received datagrams dropped for exceeding [`MAX_DATAGRAM`].
    pub oversized: u64,
}

impl TransportStats {
    pub(crate) fn record_send(&mut self, result: &std::io::Result<usize>) {
        match result {
            Ok(n) => {
                self.datagrams_sent += 1;
                self.bytes_sent += *n as u64;
            }
            Err(_) => self.send_errors += 1,
        }
    }

    pub(crate) fn record_recv(&mut self, len: usize) {
        self.datagrams_received += 1;
        self.bytes_received += len as u64;
    }
}
