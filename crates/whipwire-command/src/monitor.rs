use tracing::{debug, trace};
use whipwire_frame::{Frame, FrameKind, FrameParser, ParserConfig};

use crate::command::Command;
use crate::decoder::CommandDecoder;

/// Turns serial traffic into human-readable lines for a serial monitor.
///
/// Inbound bytes go through a [`FrameParser`]; `D` frames become
/// `Debug: <text>` lines and `V` frames become the decoded command's display.
/// A filter built with [`forwarding`] also queues the decoded commands for
/// [`take_commands`]; otherwise nothing is retained between calls.
///
/// [`forwarding`]: MonitorFilter::forwarding
/// [`take_commands`]: MonitorFilter::take_commands
#[derive(Debug, Default)]
pub struct MonitorFilter {
    parser: FrameParser,
    decoder: CommandDecoder,
    pending: Option<Vec<Command>>,
}

impl MonitorFilter {
    pub fn new(decoder: CommandDecoder) -> Self {
        Self::with_config(decoder, ParserConfig::default())
    }

    pub fn with_config(decoder: CommandDecoder, config: ParserConfig) -> Self {
        Self {
            parser: FrameParser::with_config(config),
            decoder,
            pending: None,
        }
    }

    /// Queue decoded commands until [`take_commands`](MonitorFilter::take_commands)
    /// drains them. The caller must drain regularly.
    pub fn forwarding(mut self) -> Self {
        self.pending = Some(Vec::new());
        self
    }

    pub fn is_forwarding(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed received bytes. Returns one line per completed frame, each
    /// terminated by `\n`, or an empty string when no frame completed.
    pub fn rx(&mut self, bytes: &[u8]) -> String {
        let mut out = String::new();
        for frame in self.parser.feed(bytes) {
            let line = describe(&self.decoder, self.pending.as_mut(), &frame);
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Describe a frame obtained elsewhere (for example from a `FrameReader`),
    /// queueing its command like [`rx`](MonitorFilter::rx) does.
    pub fn handle_frame(&mut self, frame: &Frame) -> String {
        describe(&self.decoder, self.pending.as_mut(), frame)
    }

    /// Outbound bytes are passed through unchanged.
    pub fn tx<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        trace!(len = bytes.len(), "tx passthrough");
        bytes
    }

    /// Drain the commands decoded since the last call, in arrival order.
    /// Always empty unless the filter is [`forwarding`](MonitorFilter::forwarding).
    pub fn take_commands(&mut self) -> Vec<Command> {
        self.pending.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// The underlying parser, for its counters.
    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }

    pub fn decoder(&self) -> &CommandDecoder {
        &self.decoder
    }
}

fn describe(
    decoder: &CommandDecoder,
    pending: Option<&mut Vec<Command>>,
    frame: &Frame,
) -> String {
    match frame.kind {
        FrameKind::Debug => format!("Debug: {}", frame.text()),
        FrameKind::Visual => {
            let cmd = decoder.decode(&frame.payload);
            if cmd.is_diagnostic() {
                debug!(command = %cmd, "undecodable visual frame");
            }
            let line = cmd.to_string();
            if let Some(pending) = pending {
                pending.push(cmd);
            }
            line
        }
    }
}
