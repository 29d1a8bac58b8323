use std::fmt::Write as _;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use whipwire_command::Rgb;
use whipwire_render::{Channel, RenderState};

/// Widest ANSI strip drawn per channel; longer strips are sampled.
const STRIP_COLUMNS: usize = 60;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Counters reported alongside a snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsumeSummary {
    pub endpoint: String,
    pub ticks: u64,
    pub commands: u64,
    pub malformed: u64,
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    #[serde(flatten)]
    summary: &'a ConsumeSummary,
    channels: Vec<ChannelOutput>,
}

#[derive(Serialize)]
struct ChannelOutput {
    index: usize,
    brightness: u8,
    pixels: Vec<String>,
}

/// Print the render state as a snapshot in `format`.
pub fn print_snapshot(state: &RenderState, summary: &ConsumeSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SnapshotOutput {
                summary,
                channels: state
                    .channels()
                    .iter()
                    .enumerate()
                    .map(|(index, channel)| ChannelOutput {
                        index,
                        brightness: channel.brightness(),
                        pixels: channel.pixels().iter().map(Rgb::to_string).collect(),
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "BRIGHTNESS", "LIT", "FIRST", "LAST"]);
            for (index, channel) in state.channels().iter().enumerate() {
                let lit = channel
                    .pixels()
                    .iter()
                    .filter(|px| **px != Rgb::BLACK)
                    .count();
                table.add_row(vec![
                    index.to_string(),
                    channel.brightness().to_string(),
                    format!("{lit}/{}", channel.pixels().len()),
                    edge_pixel(channel.pixels().first()),
                    edge_pixel(channel.pixels().last()),
                ]);
            }
            println!("{table}");
            println!(
                "endpoint={} ticks={} commands={} malformed={}",
                summary.endpoint, summary.ticks, summary.commands, summary.malformed
            );
        }
        OutputFormat::Pretty => print_strips(state),
        OutputFormat::Raw => {
            let mut bytes = Vec::with_capacity(state.layout().pixels() * 3);
            for channel in state.channels() {
                for rgb in channel.displayed() {
                    bytes.extend([rgb.r, rgb.g, rgb.b]);
                }
            }
            print_raw(&bytes);
        }
    }
}

/// Draw each channel as a row of truecolour blocks, brightness applied.
pub fn print_strips(state: &RenderState) {
    let mut out = String::new();
    for (index, channel) in state.channels().iter().enumerate() {
        let _ = write!(out, "{index:>3} ");
        out.push_str(&strip(channel));
        out.push('\n');
    }
    print!("{out}");
    let _ = std::io::stdout().flush();
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn strip(channel: &Channel) -> String {
    let displayed: Vec<Rgb> = channel.displayed().collect();
    let step = displayed.len().div_ceil(STRIP_COLUMNS).max(1);
    let mut line = String::new();
    for rgb in displayed.iter().step_by(step) {
        let _ = write!(line, "\x1b[38;2;{};{};{}m\u{2588}", rgb.r, rgb.g, rgb.b);
    }
    line.push_str("\x1b[0m");
    line
}

fn edge_pixel(rgb: Option<&Rgb>) -> String {
    rgb.map_or_else(|| "-".to_string(), Rgb::to_string)
}
