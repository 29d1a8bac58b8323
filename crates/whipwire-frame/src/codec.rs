use std::borrow::Cow;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Opening delimiter between the decimal length and the payload.
pub const OPEN_DELIM: u8 = b'{';

/// Closing delimiter after the payload.
pub const CLOSE_DELIM: u8 = b'}';

/// Default maximum declared payload length: 64 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Default maximum number of decimal digits in a length field.
pub const DEFAULT_MAX_LENGTH_DIGITS: usize = 9;

/// Frame kind, selected by the leading ASCII tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `D`: free-form diagnostic text printed by the device.
    Debug,
    /// `V`: a binary visualizer command payload.
    Visual,
}

impl FrameKind {
    /// Map a tag byte to a frame kind.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'D' => Some(Self::Debug),
            b'V' => Some(Self::Visual),
            _ => None,
        }
    }

    /// The ASCII tag written on the wire.
    pub fn tag(self) -> u8 {
        match self {
            Self::Debug => b'D',
            Self::Visual => b'V',
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("debug"),
            Self::Visual => f.write_str("visual"),
        }
    }
}

/// One complete frame extracted from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Which kind of frame this is.
    pub kind: FrameKind,
    /// Exactly the declared number of payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Declared payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text with trailing line endings removed.
    ///
    /// Invalid UTF-8 is replaced lossily; device debug output is ASCII in practice.
    pub fn text(&self) -> Cow<'_, str> {
        match String::from_utf8_lossy(self.payload.as_ref()) {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim_end_matches(['\r', '\n'])),
            Cow::Owned(s) => Cow::Owned(s.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        header_len(self.payload.len()) + self.payload.len() + 1
    }
}

/// Parser limits.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Largest declared length accepted. Markers above it are rejected.
    pub max_payload_size: usize,
    /// Longest run of length digits accepted. Longer runs are rejected.
    pub max_length_digits: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_length_digits: DEFAULT_MAX_LENGTH_DIGITS,
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────┬────────────────┬─────┬──────────────────┬─────┐
/// │ Tag │ Length         │ '{' │ Payload          │ '}' │
/// │ D/V │ ASCII decimal  │     │ (Length bytes)   │     │
/// └─────┴────────────────┴─────┴──────────────────┴─────┘
/// ```
pub fn encode_frame(kind: FrameKind, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let digits = payload.len().to_string();
    if digits.len() > DEFAULT_MAX_LENGTH_DIGITS {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: 10usize.pow(DEFAULT_MAX_LENGTH_DIGITS as u32) - 1,
        });
    }
    dst.reserve(1 + digits.len() + 1 + payload.len() + 1);
    dst.put_u8(kind.tag());
    dst.put_slice(digits.as_bytes());
    dst.put_u8(OPEN_DELIM);
    dst.put_slice(payload);
    dst.put_u8(CLOSE_DELIM);
    Ok(())
}

fn header_len(payload_len: usize) -> usize {
    let mut digits = 1;
    let mut n = payload_len / 10;
    while n > 0 {
        digits += 1;
        n /= 10;
    }
    1 + digits + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_visual_frame() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Visual, b"\x00\x00c\x03\xff\x00\x80", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"V7{\x00\x00c\x03\xff\x00\x80}");
    }

    #[test]
    fn encode_empty_debug_frame() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Debug, b"", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"D0{}");
    }

    #[test]
    fn wire_size_counts_digits() {
        assert_eq!(Frame::new(FrameKind::Debug, Bytes::new()).wire_size(), 4);
        let frame = Frame::new(FrameKind::Visual, vec![0u8; 25]);
        assert_eq!(frame.wire_size(), 1 + 2 + 1 + 25 + 1);
        let frame = Frame::new(FrameKind::Visual, vec![0u8; 100]);
        assert_eq!(frame.wire_size(), 1 + 3 + 1 + 100 + 1);
    }

    #[test]
    fn text_trims_trailing_line_endings() {
        let frame = Frame::new(FrameKind::Debug, Bytes::from_static(b"Starting\r\n"));
        assert_eq!(frame.text(), "Starting");

        let frame = Frame::new(FrameKind::Debug, Bytes::from_static(b"  keep leading\n\n"));
        assert_eq!(frame.text(), "  keep leading");
    }

    #[test]
    fn text_is_lossy_for_binary() {
        let frame = Frame::new(FrameKind::Debug, Bytes::from_static(b"bad\xff\r\n"));
        assert_eq!(frame.text(), "bad\u{fffd}");
    }

    #[test]
    fn kind_tags_roundtrip() {
        for kind in [FrameKind::Debug, FrameKind::Visual] {
            assert_eq!(FrameKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FrameKind::from_tag(b'X'), None);
    }
}
