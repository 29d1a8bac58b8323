//! Visualizer commands carried in `V` frames.
//!
//! A `V` payload is laid out as:
//! - bytes 0–1: checksum, little-endian
//! - byte 2: ASCII command tag
//! - byte 3: channel selector, 255 addresses every channel
//! - bytes 4..: tag-specific parameters, multi-byte values little-endian
//!
//! [`CommandDecoder`] turns payloads into [`Command`]s, [`encode_payload`]
//! goes the other way, and [`CommandRecord`] is the JSON form sent to the
//! renderer process.

pub mod checksum;
pub mod command;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod monitor;
pub mod record;

pub use checksum::{crc16, ChecksumPolicy, ChecksumVerdict, Crc16, Unchecked};
pub use command::{
    Command, CommandTag, Diagnostic, FlappyFrame, Pipe, Rgb, Target, ALL_CHANNELS, HEADER_LEN,
};
pub use decoder::CommandDecoder;
pub use encoder::encode_payload;
pub use error::{CommandError, Result};
pub use monitor::MonitorFilter;
pub use record::CommandRecord;
