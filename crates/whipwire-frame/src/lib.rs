//! Streaming parser for the whip controller's serial frame format.
//!
//! The controller interleaves free-text output with length-prefixed frames:
//! - A 1-byte ASCII tag: `D` (debug text) or `V` (visualizer command)
//! - The payload length as ASCII decimal digits
//! - `{`, exactly that many payload bytes, then `}`
//!
//! Chunk boundaries never matter: the parser buffers partial frames and
//! resynchronises past anything that is not a frame.

pub mod codec;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, Frame, FrameKind, ParserConfig, CLOSE_DELIM, DEFAULT_MAX_LENGTH_DIGITS,
    DEFAULT_MAX_PAYLOAD, OPEN_DELIM,
};
pub use error::{FrameError, Result};
pub use parser::{FrameParser, Frames, ParserStats};
pub use reader::FrameReader;
pub use writer::FrameWriter;
