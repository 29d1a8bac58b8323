use std::io::{BufRead, BufReader, ErrorKind};

use tracing::{debug, warn};
use whipwire_command::{encode_payload, Command, CommandRecord};
use whipwire_frame::{FrameError, FrameWriter};

use crate::cmd::{open_input, EncodeArgs};
use crate::exit::{command_error, frame_error, io_error, CliResult, SUCCESS};

/// Prefix marking a line written verbatim, outside any frame.
const NOISE_PREFIX: char = '!';

/// One input line, classified.
#[derive(Debug, PartialEq)]
enum Line<'a> {
    Skip,
    Visual(Command),
    Debug(&'a str),
    Noise(&'a str),
}

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let input = BufReader::new(open_input(&args.input)?);
    let policy = args.checksum.policy();
    let mut writer = FrameWriter::new(std::io::stdout().lock());

    for (number, line) in input.lines().enumerate() {
        let line = line.map_err(|err| io_error("read failed", err))?;
        let written = match classify(&line) {
            Line::Skip => continue,
            Line::Visual(cmd) => {
                let payload = encode_payload(&cmd, policy.as_ref())
                    .map_err(|err| command_error("encode failed", err))?;
                debug!(line = number + 1, command = %cmd, "V frame");
                writer.visual(&payload)
            }
            Line::Debug(text) => writer.debug(text),
            Line::Noise(text) => writer
                .noise(format!("{text}\n").as_bytes())
                .and_then(|()| writer.flush()),
        };
        match written {
            Ok(()) => {}
            Err(FrameError::Io(err)) if err.kind() == ErrorKind::BrokenPipe => break,
            Err(err) => return Err(frame_error("write failed", err)),
        }
    }

    Ok(SUCCESS)
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Line::Skip;
    }
    if let Some(noise) = trimmed.strip_prefix(NOISE_PREFIX) {
        return Line::Noise(noise);
    }
    if trimmed.trim_start().starts_with('{') {
        match CommandRecord::from_json(trimmed.as_bytes()) {
            Ok(record) => return Line::Visual(Command::from(record)),
            Err(err) => warn!(error = %err, "not a command record; sending as debug text"),
        }
    }
    Line::Debug(trimmed)
}
