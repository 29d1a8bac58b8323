/// Errors that can occur while reading or writing frames over a byte stream.
///
/// Parsing itself never fails: malformed input is discarded and the parser
/// resynchronises on the next marker. Only the blocking I/O adapters surface
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source reached EOF. Any partially buffered frame is dropped.
    #[error("stream closed ({pending} bytes of an incomplete frame pending)")]
    ConnectionClosed { pending: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
