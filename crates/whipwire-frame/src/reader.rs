use std::io::{ErrorKind, Read};

use crate::codec::{Frame, ParserConfig};
use crate::error::{FrameError, Result};
use crate::parser::{FrameParser, ParserStats};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` byte source (serial port, file, stdin).
///
/// Handles partial reads and interleaved device noise internally; callers
/// always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default parser limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ParserConfig::default())
    }

    /// Create a new frame reader with explicit parser limits.
    pub fn with_config(inner: T, config: ParserConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::with_config(config),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.parser.next_frame() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed {
                    pending: self.parser.buffered(),
                });
            }

            if let Some(frame) = self.parser.feed(&chunk[..read]).next() {
                return Ok(frame);
            }
        }
    }

    /// Parser counters accumulated so far.
    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    /// Yields frames until EOF. I/O errors are yielded as items.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed { .. }) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, FrameKind};

    fn wire(frames: &[(FrameKind, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (kind, payload) in frames {
            encode_frame(*kind, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let bytes = wire(&[(FrameKind::Visual, &b"hello"[..])]);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.kind, FrameKind::Visual);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_frames_across_device_noise() {
        let mut bytes = b"Teensy boot\r\n".to_vec();
        bytes.extend(wire(&[(FrameKind::Debug, &b"one\n"[..])]));
        bytes.extend(b"stray");
        bytes.extend(wire(&[(FrameKind::Visual, &b"two"[..])]));

        let reader = FrameReader::new(Cursor::new(bytes));
        let frames: Vec<_> = reader.map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].text(), "one");
        assert_eq!(frames[1].payload.as_ref(), b"two");
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[(FrameKind::Visual, &b"slow"[..])]);
        let byte_reader = ByteByByteReader { bytes, pos: 0 };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed { pending: 0 }));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"V16{only-part".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed { pending: 13 }));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire(&[(FrameKind::Debug, &b"ok"[..])]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn timeout_propagates_io_error() {
        let mut framed = FrameReader::new(TimesOut);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::TimedOut));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct TimesOut;

    impl Read for TimesOut {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }
}
