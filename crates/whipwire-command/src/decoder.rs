use bytes::{Buf, Bytes};
use tracing::trace;

use crate::checksum::{ChecksumPolicy, ChecksumVerdict, Unchecked};
use crate::command::{
    Command, CommandTag, Diagnostic, FlappyFrame, Pipe, Rgb, Target, HEADER_LEN,
};

/// Decodes `V` frame payloads into commands.
///
/// Decoding never fails: malformed payloads become [`Command::Diagnostic`].
#[derive(Debug)]
pub struct CommandDecoder {
    checksum: Box<dyn ChecksumPolicy>,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDecoder {
    /// A decoder that does not validate checksums.
    pub fn new() -> Self {
        Self::with_checksum(Unchecked)
    }

    /// A decoder that validates checksums with `policy`.
    pub fn with_checksum(policy: impl ChecksumPolicy + 'static) -> Self {
        Self {
            checksum: Box::new(policy),
        }
    }

    /// A decoder using an already boxed policy.
    pub fn with_boxed_checksum(checksum: Box<dyn ChecksumPolicy>) -> Self {
        Self { checksum }
    }

    /// The active checksum policy.
    pub fn checksum(&self) -> &dyn ChecksumPolicy {
        self.checksum.as_ref()
    }

    /// Decode one payload.
    pub fn decode(&self, payload: &[u8]) -> Command {
        if payload.len() < HEADER_LEN {
            return Command::Diagnostic(Diagnostic::TooShort {
                raw: Bytes::copy_from_slice(payload),
            });
        }

        let tag = payload[2];
        let target = Target::from_wire(payload[3]);

        if let ChecksumVerdict::Mismatch { stored, computed } = self.checksum.verify(payload) {
            return Command::Diagnostic(Diagnostic::ChecksumMismatch {
                tag,
                target,
                stored,
                computed,
            });
        }

        let Some(kind) = CommandTag::from_byte(tag) else {
            return Command::Unknown {
                tag,
                target,
                raw: Bytes::copy_from_slice(payload),
            };
        };

        let mut params = &payload[HEADER_LEN..];
        if params.len() < kind.param_len() {
            return Command::Diagnostic(Diagnostic::Incomplete {
                tag,
                target,
                needed: kind.param_len(),
                got: params.len(),
            });
        }
        if params.len() > kind.param_len() {
            trace!(
                tag = %(tag as char),
                extra = params.len() - kind.param_len(),
                "ignoring trailing parameter bytes"
            );
        }

        match kind {
            CommandTag::SetColor => {
                let r = params.get_u8();
                let g = params.get_u8();
                let b = params.get_u8();
                Command::SetColor {
                    target,
                    rgb: Rgb::new(r, g, b),
                }
            }
            CommandTag::ShowGifFrame => {
                let frame = params.get_u32_le();
                let source_id = params.get_u16_le();
                Command::ShowGifFrame {
                    target,
                    frame,
                    source_id,
                }
            }
            CommandTag::SetBrightness => Command::SetBrightness {
                target,
                level: params.get_u8(),
            },
            CommandTag::SelfIdentify => Command::SelfIdentify { target },
            CommandTag::FlappyState => Command::FlappyState {
                target,
                state: read_flappy(&mut params),
            },
        }
    }
}

fn read_flappy(params: &mut &[u8]) -> FlappyFrame {
    let game_state = params.get_u8();
    let bird_y = params.get_u16_le();
    let score = params.get_u16_le();
    let mut pipes = [Pipe::default(); 3];
    for pipe in &mut pipes {
        pipe.x = params.get_i16_le();
        pipe.gap_y = params.get_u16_le();
    }
    let scroll_x = params.get_i16_le();
    FlappyFrame {
        game_state,
        bird_y,
        score,
        pipes,
        scroll_x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Crc16;
    use crate::encoder::encode_payload;

    fn payload(tag: u8, channel: u8, params: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, tag, channel];
        out.extend_from_slice(params);
        out
    }

    #[test]
    fn set_color_on_one_channel() {
        let cmd = CommandDecoder::new().decode(&payload(b'c', 3, &[255, 0, 128]));
        assert_eq!(
            cmd,
            Command::SetColor {
                target: Target::Channel(3),
                rgb: Rgb::new(255, 0, 128),
            }
        );
    }

    #[test]
    fn gif_frame_fields_are_little_endian() {
        let cmd = CommandDecoder::new().decode(&payload(
            b'g',
            255,
            &[0x78, 0x56, 0x34, 0x12, 0x07, 0x00],
        ));
        assert_eq!(
            cmd,
            Command::ShowGifFrame {
                target: Target::All,
                frame: 0x1234_5678,
                source_id: 7,
            }
        );
    }

    #[test]
    fn brightness_and_identify() {
        let decoder = CommandDecoder::new();
        assert_eq!(
            decoder.decode(&payload(b'b', 0, &[42])),
            Command::SetBrightness {
                target: Target::Channel(0),
                level: 42,
            }
        );
        assert_eq!(
            decoder.decode(&payload(b'i', 12, &[])),
            Command::SelfIdentify {
                target: Target::Channel(12),
            }
        );
    }

    #[test]
    fn flappy_sign_extends_signed_fields() {
        let mut params = vec![2];
        params.extend(300u16.to_le_bytes());
        params.extend(17u16.to_le_bytes());
        for (x, gap) in [(i16::MIN, 10u16), (i16::MAX, 20), (-1, 30)] {
            params.extend(x.to_le_bytes());
            params.extend(gap.to_le_bytes());
        }
        params.extend((-5i16).to_le_bytes());

        let cmd = CommandDecoder::new().decode(&payload(b'f', 255, &params));
        let Command::FlappyState { target, state } = cmd else {
            panic!("expected FlappyState, got {cmd:?}");
        };
        assert_eq!(target, Target::All);
        assert_eq!(state.game_state, 2);
        assert_eq!(state.bird_y, 300);
        assert_eq!(state.score, 17);
        assert_eq!(state.pipes[0], Pipe { x: -32768, gap_y: 10 });
        assert_eq!(state.pipes[1], Pipe { x: 32767, gap_y: 20 });
        assert_eq!(state.pipes[2], Pipe { x: -1, gap_y: 30 });
        assert_eq!(state.scroll_x, -5);
    }

    #[test]
    fn roundtrip_through_encoder() {
        let state = FlappyFrame {
            game_state: 1,
            bird_y: u16::MAX,
            score: 0,
            pipes: [
                Pipe {
                    x: i16::MIN,
                    gap_y: 0,
                },
                Pipe {
                    x: i16::MAX,
                    gap_y: u16::MAX,
                },
                Pipe { x: 0, gap_y: 512 },
            ],
            scroll_x: i16::MIN,
        };
        let commands = [
            Command::SetColor {
                target: Target::All,
                rgb: Rgb::new(1, 2, 3),
            },
            Command::ShowGifFrame {
                target: Target::Channel(23),
                frame: u32::MAX,
                source_id: u16::MAX,
            },
            Command::SetBrightness {
                target: Target::Channel(0),
                level: 0,
            },
            Command::SelfIdentify {
                target: Target::Channel(31),
            },
            Command::FlappyState {
                target: Target::All,
                state,
            },
        ];

        let policies: [fn() -> Box<dyn ChecksumPolicy>; 2] =
            [|| Box::new(Unchecked), || Box::new(Crc16)];
        for make in policies {
            let policy = make();
            let decoder = CommandDecoder::with_boxed_checksum(make());
            for cmd in &commands {
                let bytes = encode_payload(cmd, policy.as_ref()).unwrap();
                assert_eq!(&decoder.decode(&bytes), cmd, "policy {}", policy.name());
            }
        }
    }

    #[test]
    fn short_parameters_are_incomplete() {
        let cmd = CommandDecoder::new().decode(&payload(b'c', 3, &[255]));
        assert_eq!(
            cmd,
            Command::Diagnostic(Diagnostic::Incomplete {
                tag: b'c',
                target: Target::Channel(3),
                needed: 3,
                got: 1,
            })
        );

        let cmd = CommandDecoder::new().decode(&payload(b'f', 255, &[0; 18]));
        assert!(matches!(
            cmd,
            Command::Diagnostic(Diagnostic::Incomplete {
                needed: 19,
                got: 18,
                ..
            })
        ));
    }

    #[test]
    fn header_shorter_than_four_bytes() {
        for len in 0..HEADER_LEN {
            let raw = vec![b'c'; len];
            let cmd = CommandDecoder::new().decode(&raw);
            assert_eq!(
                cmd,
                Command::Diagnostic(Diagnostic::TooShort {
                    raw: Bytes::from(raw),
                })
            );
        }
    }

    #[test]
    fn unknown_tag_keeps_raw_payload() {
        let bytes = payload(b'z', 4, &[9, 9]);
        let cmd = CommandDecoder::new().decode(&bytes);
        assert_eq!(
            cmd,
            Command::Unknown {
                tag: b'z',
                target: Target::Channel(4),
                raw: Bytes::from(bytes),
            }
        );
    }

    #[test]
    fn trailing_parameter_bytes_are_ignored() {
        let cmd = CommandDecoder::new().decode(&payload(b'b', 1, &[200, 1, 2, 3]));
        assert_eq!(
            cmd,
            Command::SetBrightness {
                target: Target::Channel(1),
                level: 200,
            }
        );
    }

    #[test]
    fn checksum_mismatch_is_a_diagnostic() {
        let mut bytes = payload(b'c', 3, &[255, 0, 128]);
        Crc16.seal(&mut bytes);
        bytes[4] = 0;

        let cmd = CommandDecoder::with_checksum(Crc16).decode(&bytes);
        assert!(matches!(
            cmd,
            Command::Diagnostic(Diagnostic::ChecksumMismatch {
                tag: b'c',
                target: Target::Channel(3),
                ..
            })
        ));

        // The default decoder does not look at the checksum.
        assert!(matches!(
            CommandDecoder::new().decode(&bytes),
            Command::SetColor { .. }
        ));
    }
}
