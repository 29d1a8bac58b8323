use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, FrameKind, ParserConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete frames to any `Write` sink.
///
/// This is the device side of the wire format; the simulator and tests use it
/// to produce byte streams a real controller would emit.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: ParserConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ParserConfig::default())
    }

    /// Create a new frame writer with explicit limits.
    pub fn with_config(inner: T, config: ParserConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.kind, frame.payload.as_ref())
    }

    /// Write a `D` frame carrying debug text.
    pub fn debug(&mut self, text: &str) -> Result<()> {
        self.send(FrameKind::Debug, text.as_bytes())
    }

    /// Write a `V` frame carrying a command payload.
    pub fn visual(&mut self, payload: &[u8]) -> Result<()> {
        self.send(FrameKind::Visual, payload)
    }

    /// Encode and send a payload as one frame.
    pub fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(kind, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(FrameError::Io(std::io::Error::from(ErrorKind::WriteZero)))
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Write raw bytes outside any frame (device free-text output).
    pub fn noise(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
