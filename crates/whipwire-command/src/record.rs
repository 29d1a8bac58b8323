//! JSON records carried from the producer to the renderer, one per datagram.

use serde::{Deserialize, Serialize};

use crate::command::{Command, FlappyFrame, Pipe, Rgb, Target};
use crate::error::{CommandError, Result};

/// Wire form of a transported command, tagged by `type`.
///
/// `channel` is the selector byte (255 addresses every channel). Senders that
/// still write the field as `whip` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandRecord {
    #[serde(rename = "set_whip_color")]
    SetColor {
        #[serde(alias = "whip")]
        channel: u8,
        r: u8,
        g: u8,
        b: u8,
    },
    SetBrightness {
        #[serde(alias = "whip")]
        channel: u8,
        brightness: u8,
    },
    SelfIdentify {
        #[serde(alias = "whip")]
        channel: u8,
    },
    ShowGifFrame {
        #[serde(alias = "whip")]
        channel: u8,
        frame: u32,
        source_id: u16,
    },
    FlappyState {
        #[serde(alias = "whip")]
        channel: u8,
        game_state: u8,
        bird_y: u16,
        score: u16,
        pipe1_x: i16,
        pipe1_gap_y: u16,
        pipe2_x: i16,
        pipe2_gap_y: u16,
        pipe3_x: i16,
        pipe3_gap_y: u16,
        scroll_x: i16,
    },
}

impl CommandRecord {
    /// Serialize to the datagram body.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a datagram body.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl TryFrom<&Command> for CommandRecord {
    type Error = CommandError;

    fn try_from(cmd: &Command) -> Result<Self> {
        Ok(match *cmd {
            Command::SetColor { target, rgb } => Self::SetColor {
                channel: target.to_wire(),
                r: rgb.r,
                g: rgb.g,
                b: rgb.b,
            },
            Command::SetBrightness { target, level } => Self::SetBrightness {
                channel: target.to_wire(),
                brightness: level,
            },
            Command::SelfIdentify { target } => Self::SelfIdentify {
                channel: target.to_wire(),
            },
            Command::ShowGifFrame {
                target,
                frame,
                source_id,
            } => Self::ShowGifFrame {
                channel: target.to_wire(),
                frame,
                source_id,
            },
            Command::FlappyState { target, state } => {
                let [p1, p2, p3] = state.pipes;
                Self::FlappyState {
                    channel: target.to_wire(),
                    game_state: state.game_state,
                    bird_y: state.bird_y,
                    score: state.score,
                    pipe1_x: p1.x,
                    pipe1_gap_y: p1.gap_y,
                    pipe2_x: p2.x,
                    pipe2_gap_y: p2.gap_y,
                    pipe3_x: p3.x,
                    pipe3_gap_y: p3.gap_y,
                    scroll_x: state.scroll_x,
                }
            }
            Command::Unknown { .. } | Command::Diagnostic(_) => {
                return Err(CommandError::NotTransportable(cmd.name()))
            }
        })
    }
}

impl From<CommandRecord> for Command {
    fn from(record: CommandRecord) -> Self {
        match record {
            CommandRecord::SetColor { channel, r, g, b } => Command::SetColor {
                target: Target::from_wire(channel),
                rgb: Rgb::new(r, g, b),
            },
            CommandRecord::SetBrightness {
                channel,
                brightness,
            } => Command::SetBrightness {
                target: Target::from_wire(channel),
                level: brightness,
            },
            CommandRecord::SelfIdentify { channel } => Command::SelfIdentify {
                target: Target::from_wire(channel),
            },
            CommandRecord::ShowGifFrame {
                channel,
                frame,
                source_id,
            } => Command::ShowGifFrame {
                target: Target::from_wire(channel),
                frame,
                source_id,
            },
            CommandRecord::FlappyState {
                channel,
                game_state,
                bird_y,
                score,
                pipe1_x,
                pipe1_gap_y,
                pipe2_x,
                pipe2_gap_y,
                pipe3_x,
                pipe3_gap_y,
                scroll_x,
            } => Command::FlappyState {
                target: Target::from_wire(channel),
                state: FlappyFrame {
                    game_state,
                    bird_y,
                    score,
                    pipes: [
                        Pipe {
                            x: pipe1_x,
                            gap_y: pipe1_gap_y,
                        },
                        Pipe {
                            x: pipe2_x,
                            gap_y: pipe2_gap_y,
                        },
                        Pipe {
                            x: pipe3_x,
                            gap_y: pipe3_gap_y,
                        },
                    ],
                    scroll_x,
                },
            },
        }
    }
}
