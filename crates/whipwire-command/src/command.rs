use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Channel selector value that addresses every channel.
pub const ALL_CHANNELS: u8 = 255;

/// Bytes before the parameters: checksum (2), tag (1), channel selector (1).
pub const HEADER_LEN: usize = 4;

/// Which channels a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A single channel by index. Indices past the configured count match nothing.
    Channel(u8),
    /// Every channel.
    All,
}

impl Target {
    /// Interpret a wire selector byte.
    pub fn from_wire(selector: u8) -> Self {
        if selector == ALL_CHANNELS {
            Self::All
        } else {
            Self::Channel(selector)
        }
    }

    /// The selector byte written on the wire.
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Channel(index) => index,
            Self::All => ALL_CHANNELS,
        }
    }

    /// True when this target addresses `index`.
    pub fn selects(self, index: usize) -> bool {
        match self {
            Self::Channel(selected) => usize::from(selected) == index,
            Self::All => true,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(index) => write!(f, "{index}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// An RGB triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale each component by `level / 255` with integer division.
    pub fn scaled(self, level: u8) -> Self {
        let scale = |c: u8| ((u16::from(c) * u16::from(level)) / 255) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One pipe of the flappy game: horizontal position and gap centre.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pipe {
    pub x: i16,
    pub gap_y: u16,
}

/// Game-state scalars carried by the `f` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlappyFrame {
    pub game_state: u8,
    pub bird_y: u16,
    pub score: u16,
    pub pipes: [Pipe; 3],
    pub scroll_x: i16,
}

/// Recognised command tags. Dispatch on this is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    SetColor,
    ShowGifFrame,
    SetBrightness,
    SelfIdentify,
    FlappyState,
}

impl CommandTag {
    pub fn from_byte(tag: u8) -> Option<Self> {
        match tag {
            b'c' => Some(Self::SetColor),
            b'g' => Some(Self::ShowGifFrame),
            b'b' => Some(Self::SetBrightness),
            b'i' => Some(Self::SelfIdentify),
            b'f' => Some(Self::FlappyState),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Self::SetColor => b'c',
            Self::ShowGifFrame => b'g',
            Self::SetBrightness => b'b',
            Self::SelfIdentify => b'i',
            Self::FlappyState => b'f',
        }
    }

    /// Number of parameter bytes following the header.
    pub fn param_len(self) -> usize {
        match self {
            Self::SetColor => 3,
            Self::ShowGifFrame => 6,
            Self::SetBrightness => 1,
            Self::SelfIdentify => 0,
            Self::FlappyState => 19,
        }
    }
}

/// A decoded visualizer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetColor {
        target: Target,
        rgb: Rgb,
    },
    ShowGifFrame {
        target: Target,
        frame: u32,
        source_id: u16,
    },
    SetBrightness {
        target: Target,
        level: u8,
    },
    SelfIdentify {
        target: Target,
    },
    FlappyState {
        target: Target,
        state: FlappyFrame,
    },
    /// Well-formed header with a tag this side does not know. `raw` is the whole payload.
    Unknown {
        tag: u8,
        target: Target,
        raw: Bytes,
    },
    /// The payload could not be decoded; kept for logging only.
    Diagnostic(Diagnostic),
}

/// Why a payload did not decode into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Fewer than the four header bytes.
    TooShort { raw: Bytes },
    /// Known tag, parameters cut short.
    Incomplete {
        tag: u8,
        target: Target,
        needed: usize,
        got: usize,
    },
    /// The checksum policy rejected the payload.
    ChecksumMismatch {
        tag: u8,
        target: Target,
        stored: u16,
        computed: u16,
    },
}

impl Command {
    /// Short variant name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetColor { .. } => "SetColor",
            Self::ShowGifFrame { .. } => "ShowGifFrame",
            Self::SetBrightness { .. } => "SetBrightness",
            Self::SelfIdentify { .. } => "SelfIdentify",
            Self::FlappyState { .. } => "FlappyState",
            Self::Unknown { .. } => "Unknown",
            Self::Diagnostic(Diagnostic::TooShort { .. }) => "TooShort",
            Self::Diagnostic(Diagnostic::Incomplete { .. }) => "Incomplete",
            Self::Diagnostic(Diagnostic::ChecksumMismatch { .. }) => "ChecksumMismatch",
        }
    }

    /// The addressed channels, if the header was readable.
    pub fn target(&self) -> Option<Target> {
        match self {
            Self::SetColor { target, .. }
            | Self::ShowGifFrame { target, .. }
            | Self::SetBrightness { target, .. }
            | Self::SelfIdentify { target }
            | Self::FlappyState { target, .. }
            | Self::Unknown { target, .. } => Some(*target),
            Self::Diagnostic(Diagnostic::Incomplete { target, .. })
            | Self::Diagnostic(Diagnostic::ChecksumMismatch { target, .. }) => Some(*target),
            Self::Diagnostic(Diagnostic::TooShort { .. }) => None,
        }
    }

    /// True for the diagnostic variants.
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Diagnostic(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetColor { target, rgb } => {
                write!(f, "SetColor channel={target} r={} g={} b={}", rgb.r, rgb.g, rgb.b)
            }
            Self::ShowGifFrame {
                target,
                frame,
                source_id,
            } => write!(
                f,
                "ShowGifFrame channel={target} frame={frame} gif={source_id}"
            ),
            Self::SetBrightness { target, level } => {
                write!(f, "SetBrightness channel={target} brightness={level}")
            }
            Self::SelfIdentify { target } => write!(f, "SelfIdentify channel={target}"),
            Self::FlappyState { target, state } => {
                write!(
                    f,
                    "FlappyState channel={target} state={} bird_y={} score={} pipes=[",
                    state.game_state, state.bird_y, state.score
                )?;
                for (i, pipe) in state.pipes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({}, {})", pipe.x, pipe.gap_y)?;
                }
                write!(f, "] scroll_x={}", state.scroll_x)
            }
            Self::Unknown { tag, target, raw } => write!(
                f,
                "Unknown tag={} channel={target} raw=[{}]",
                tag_display(*tag),
                hex(raw)
            ),
            Self::Diagnostic(diagnostic) => fmt::Display::fmt(diagnostic, f),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { raw } => write!(f, "TooShort raw=[{}]", hex(raw)),
            Self::Incomplete {
                tag,
                target,
                needed,
                got,
            } => write!(
                f,
                "Incomplete tag={} channel={target} (needs {needed} parameter bytes, got {got})",
                tag_display(*tag)
            ),
            Self::ChecksumMismatch {
                tag,
                target,
                stored,
                computed,
            } => write!(
                f,
                "ChecksumMismatch tag={} channel={target} stored=0x{stored:04x} computed=0x{computed:04x}",
                tag_display(*tag)
            ),
        }
    }
}

fn tag_display(tag: u8) -> String {
    if tag.is_ascii_graphic() {
        format!("'{}'", tag as char)
    } else {
        format!("0x{tag:02x}")
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
