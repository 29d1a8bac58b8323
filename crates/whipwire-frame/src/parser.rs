use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{Frame, FrameKind, ParserConfig, CLOSE_DELIM, OPEN_DELIM};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Counters describing what the parser has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Complete frames emitted.
    pub frames: u64,
    /// Non-protocol bytes dropped while resynchronising.
    pub discarded_bytes: u64,
    /// Markers rejected for an oversized length field.
    pub rejected_markers: u64,
    /// Frames whose closing byte was not `}`.
    pub bad_trailers: u64,
}

/// Turns an arbitrarily chunked byte stream into complete frames.
///
/// The parser owns its buffer. Bytes that cannot belong to a frame are
/// dropped, an incomplete frame is retained until the rest arrives, and the
/// emitted frame sequence depends only on the concatenation of everything fed.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    config: ParserConfig,
    stats: ParserStats,
}

/// Lazy iterator over the frames completed by one [`FrameParser::feed`] call.
///
/// Dropping it early is harmless: unread frames stay buffered and are
/// returned by the next pass.
#[derive(Debug)]
pub struct Frames<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.parser.next_frame()
    }
}

enum Marker {
    Complete { header: usize, length: usize },
    NeedMore,
    NotMarker,
    Rejected,
}

enum Scan {
    Found {
        start: usize,
        header: usize,
        length: usize,
    },
    Noise {
        keep_from: usize,
    },
}

impl FrameParser {
    /// Create a parser with default limits.
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a parser with explicit limits.
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            stats: ParserStats::default(),
        }
    }

    /// Append received bytes and iterate over the frames they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(bytes);
        Frames { parser: self }
    }

    /// Extract the next complete frame from the buffer, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        match scan(&self.buf, &self.config, &mut self.stats.rejected_markers) {
            Scan::Noise { keep_from } => {
                self.discard(keep_from);
                None
            }
            Scan::Found {
                start,
                header,
                length,
            } => {
                self.discard(start);

                let total = header + length + 1;
                if self.buf.len() < total {
                    trace!(
                        buffered = self.buf.len(),
                        needed = total,
                        "waiting for rest of frame"
                    );
                    return None;
                }

                // The scan guarantees a tag byte at offset 0.
                let kind = FrameKind::from_tag(self.buf[0])?;
                self.buf.advance(header);
                let payload = self.buf.split_to(length).freeze();
                let trailer = self.buf[0];
                self.buf.advance(1);

                if trailer != CLOSE_DELIM {
                    self.stats.bad_trailers += 1;
                    debug!(%kind, length, trailer, "frame closed by unexpected byte");
                }

                self.stats.frames += 1;
                Some(Frame { kind, payload })
            }
        }
    }

    /// Number of bytes currently retained.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Parser counters.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Current parser limits.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Drop everything buffered (e.g. after the device reconnects).
    pub fn reset(&mut self) {
        let dropped = self.buf.len();
        self.buf.clear();
        self.stats.discarded_bytes += dropped as u64;
    }

    fn discard(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        trace!(count, "discarding non-protocol bytes");
        self.buf.advance(count);
        self.stats.discarded_bytes += count as u64;
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

fn scan(buf: &[u8], config: &ParserConfig, rejected: &mut u64) -> Scan {
    for start in 0..buf.len() {
        if FrameKind::from_tag(buf[start]).is_none() {
            continue;
        }
        match parse_marker(&buf[start..], config) {
            Marker::Complete { header, length } => {
                return Scan::Found {
                    start,
                    header,
                    length,
                }
            }
            Marker::NeedMore => return Scan::Noise { keep_from: start },
            Marker::NotMarker => {}
            Marker::Rejected => {
                *rejected += 1;
                debug!(offset = start, "rejecting frame marker with oversized length");
            }
        }
    }
    Scan::Noise {
        keep_from: buf.len(),
    }
}

/// Parse `<tag><digits>{` at the start of `s`. `s[0]` is already a tag.
fn parse_marker(s: &[u8], config: &ParserConfig) -> Marker {
    let mut length = 0usize;
    let mut digits = 0usize;

    for (offset, &byte) in s.iter().enumerate().skip(1) {
        match byte {
            b'0'..=b'9' => {
                digits += 1;
                if digits > config.max_length_digits {
                    return Marker::Rejected;
                }
                length = match length
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(usize::from(byte - b'0')))
                {
                    Some(n) => n,
                    None => return Marker::Rejected,
                };
            }
            OPEN_DELIM if digits > 0 => {
                if length > config.max_payload_size {
                    return Marker::Rejected;
                }
                return Marker::Complete {
                    header: offset + 1,
                    length,
                };
            }
            _ => return Marker::NotMarker,
        }
    }

    Marker::NeedMore
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(frames: &[(FrameKind, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (kind, payload) in frames {
            encode_frame(*kind, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn parse_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Vec<Frame> {
        let mut parser = FrameParser::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(parser.feed(chunk));
        }
        out
    }

    fn sample_stream() -> Vec<u8> {
        let mut bytes = b"boot noise\r\n".to_vec();
        bytes.extend(wire(&[(FrameKind::Debug, &b"Starting\r\n"[..])]));
        bytes.extend(b"VD garbage V12 D{ V9x");
        bytes.extend(wire(&[
            (FrameKind::Visual, &b"\x00\x00c\x03\xff\x00\x80"[..]),
            (FrameKind::Visual, &b""[..]),
            (FrameKind::Debug, &b"payload with } and V3{ inside"[..]),
        ]));
        bytes.extend(b"D");
        bytes.extend(wire(&[(FrameKind::Visual, &[0x5a; 25][..])]));
        bytes.extend(b"trailing D12");
        bytes
    }

    #[test]
    fn parses_single_frame() {
        let frames = parse_chunks([wire(&[(FrameKind::Visual, &b"abc"[..])]).as_slice()]);
        assert_eq!(frames, vec![Frame::new(FrameKind::Visual, &b"abc"[..])]);
    }

    #[test]
    fn zero_length_frame_is_valid() {
        let frames = parse_chunks([&b"V0{}D0{}"[..]]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(Frame::is_empty));
        assert_eq!(frames[0].kind, FrameKind::Visual);
        assert_eq!(frames[1].kind, FrameKind::Debug);
    }

    #[test]
    fn garbage_between_frames_is_dropped() {
        let frames = parse_chunks([sample_stream().as_slice()]);
        let kinds: Vec<_> = frames.iter().map(|f| (f.kind, f.len())).collect();
        assert_eq!(
            kinds,
            vec![
                (FrameKind::Debug, 10),
                (FrameKind::Visual, 7),
                (FrameKind::Visual, 0),
                (FrameKind::Debug, 29),
                (FrameKind::Visual, 25),
            ]
        );
        assert_eq!(frames[0].text(), "Starting");
        assert_eq!(frames[3].payload.as_ref(), b"payload with } and V3{ inside");
    }

    #[test]
    fn every_two_way_split_matches_single_feed() {
        let stream = sample_stream();
        let expected = parse_chunks([stream.as_slice()]);
        for split in 0..=stream.len() {
            let (a, b) = stream.split_at(split);
            assert_eq!(parse_chunks([a, b]), expected, "split at {split}");
        }
    }

    #[test]
    fn byte_by_byte_matches_single_feed() {
        let stream = sample_stream();
        let expected = parse_chunks([stream.as_slice()]);
        assert_eq!(parse_chunks(stream.chunks(1)), expected);
    }

    #[test]
    fn irregular_chunkings_match_single_feed() {
        let stream = sample_stream();
        let expected = parse_chunks([stream.as_slice()]);

        let mut seed = 0x2545_f491u32;
        for _ in 0..200 {
            let mut chunks = Vec::new();
            let mut rest = stream.as_slice();
            while !rest.is_empty() {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let n = (seed >> 24) as usize % 9;
                let n = n.min(rest.len());
                let (head, tail) = rest.split_at(n);
                chunks.push(head);
                rest = tail;
            }
            assert_eq!(parse_chunks(chunks), expected);
        }
    }

    #[test]
    fn truncated_payload_stalls_until_complete() {
        let full = wire(&[(FrameKind::Visual, &[7u8; 25][..])]);
        let header = b"V25{".len();
        let mut parser = FrameParser::new();

        let first = &full[..header + 20];
        assert_eq!(parser.feed(first).count(), 0);
        assert_eq!(parser.buffered(), first.len());

        let frames: Vec<_> = parser.feed(&full[header + 20..]).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 25);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn truncated_header_stalls_until_complete() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(b"noise V1").count(), 0);
        assert_eq!(parser.buffered(), 2, "noise dropped, marker prefix kept");
        assert_eq!(parser.feed(b"2").count(), 0);
        assert_eq!(parser.feed(b"{hello world!").count(), 0);
        let frames: Vec<_> = parser.feed(b"}").collect();
        assert_eq!(frames, vec![Frame::new(FrameKind::Visual, &b"hello world!"[..])]);
    }

    #[test]
    fn buffer_holds_only_incomplete_prefix_after_pass() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(b"no markers here at all").count(), 0);
        assert_eq!(parser.buffered(), 0);

        assert_eq!(parser.feed(b"xxD5{ab").count(), 0);
        assert_eq!(parser.buffered(), 5);
    }

    #[test]
    fn oversized_digit_run_skips_marker() {
        let mut stream = b"V1234567890{".to_vec();
        stream.extend(wire(&[(FrameKind::Debug, &b"ok"[..])]));
        let mut parser = FrameParser::new();
        let frames: Vec<_> = parser.feed(&stream).collect();
        assert_eq!(frames, vec![Frame::new(FrameKind::Debug, &b"ok"[..])]);
        assert_eq!(parser.stats().rejected_markers, 1);
    }

    #[test]
    fn declared_length_above_limit_skips_marker() {
        let config = ParserConfig {
            max_payload_size: 8,
            ..ParserConfig::default()
        };
        let mut parser = FrameParser::with_config(config);
        let mut stream = b"V9{".to_vec();
        stream.extend(wire(&[(FrameKind::Visual, &b"fits"[..])]));
        let frames: Vec<_> = parser.feed(&stream).collect();
        assert_eq!(frames, vec![Frame::new(FrameKind::Visual, &b"fits"[..])]);
        assert_eq!(parser.stats().rejected_markers, 1);
    }

    #[test]
    fn marker_without_digits_is_text() {
        let frames = parse_chunks([&b"D{not a frame}V{}"[..]]);
        assert!(frames.is_empty());
    }

    #[test]
    fn wrong_trailer_still_emits_declared_length() {
        let mut parser = FrameParser::new();
        let frames: Vec<_> = parser.feed(b"D3{abcXD1{z}").collect();
        assert_eq!(
            frames,
            vec![
                Frame::new(FrameKind::Debug, &b"abc"[..]),
                Frame::new(FrameKind::Debug, &b"z"[..]),
            ]
        );
        assert_eq!(parser.stats().bad_trailers, 1);
    }

    #[test]
    fn dropping_iterator_keeps_remaining_frames() {
        let stream = wire(&[(FrameKind::Debug, &b"one"[..]), (FrameKind::Debug, &b"two"[..])]);
        let mut parser = FrameParser::new();
        let first = parser.feed(&stream).next().unwrap();
        assert_eq!(first.payload.as_ref(), b"one");
        let rest: Vec<_> = parser.feed(&[]).collect();
        assert_eq!(rest, vec![Frame::new(FrameKind::Debug, &b"two"[..])]);
    }

    #[test]
    fn stats_track_frames_and_noise() {
        let mut parser = FrameParser::new();
        let _ = parser.feed(b"abcD1{x}").count();
        let stats = parser.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.discarded_bytes, 3);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(b"V10{abc").count(), 0);
        parser.reset();
        assert_eq!(parser.buffered(), 0);
        let frames: Vec<_> = parser.feed(b"V1{q}").collect();
        assert_eq!(frames.len(), 1);
    }
}
