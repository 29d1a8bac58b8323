use bytes::BufMut;

use crate::checksum::ChecksumPolicy;
use crate::command::{Command, CommandTag, HEADER_LEN};
use crate::error::{CommandError, Result};

/// Encode a command as a `V` frame payload, checksum filled by `checksum`.
///
/// `Unknown` commands are re-emitted from their raw bytes with the checksum
/// recomputed. Diagnostics have no payload form.
pub fn encode_payload(cmd: &Command, checksum: &dyn ChecksumPolicy) -> Result<Vec<u8>> {
    let mut out = match cmd {
        Command::Unknown { raw, .. } if raw.len() >= HEADER_LEN => raw.to_vec(),
        Command::Unknown { .. } => return Err(CommandError::NotEncodable(cmd.name())),
        Command::Diagnostic(_) => return Err(CommandError::NotEncodable(cmd.name())),
        _ => encode_known(cmd)?,
    };
    checksum.seal(&mut out);
    Ok(out)
}

fn encode_known(cmd: &Command) -> Result<Vec<u8>> {
    let (tag, target) = match cmd {
        Command::SetColor { target, .. } => (CommandTag::SetColor, target),
        Command::ShowGifFrame { target, .. } => (CommandTag::ShowGifFrame, target),
        Command::SetBrightness { target, .. } => (CommandTag::SetBrightness, target),
        Command::SelfIdentify { target } => (CommandTag::SelfIdentify, target),
        Command::FlappyState { target, .. } => (CommandTag::FlappyState, target),
        Command::Unknown { .. } | Command::Diagnostic(_) => {
            return Err(CommandError::NotEncodable(cmd.name()))
        }
    };

    let mut out = Vec::with_capacity(HEADER_LEN + tag.param_len());
    out.put_u16_le(0);
    out.put_u8(tag.byte());
    out.put_u8(target.to_wire());

    match cmd {
        Command::SetColor { rgb, .. } => {
            out.put_u8(rgb.r);
            out.put_u8(rgb.g);
            out.put_u8(rgb.b);
        }
        Command::ShowGifFrame {
            frame, source_id, ..
        } => {
            out.put_u32_le(*frame);
            out.put_u16_le(*source_id);
        }
        Command::SetBrightness { level, .. } => out.put_u8(*level),
        Command::FlappyState { state, .. } => {
            out.put_u8(state.game_state);
            out.put_u16_le(state.bird_y);
            out.put_u16_le(state.score);
            for pipe in &state.pipes {
                out.put_i16_le(pipe.x);
                out.put_u16_le(pipe.gap_y);
            }
            out.put_i16_le(state.scroll_x);
        }
        _ => {}
    }
    Ok(out)
}
