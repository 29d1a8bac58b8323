use clap::{Args, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use whipwire_command::{ChecksumPolicy, CommandDecoder, Crc16, Unchecked};
use whipwire_render::{DEFAULT_CHANNELS, DEFAULT_LEDS};
use whipwire_transport::{Endpoint, DEFAULT_ENDPOINT};

use crate::exit::{io_error, transport_error, CliResult};
use crate::output::OutputFormat;

pub mod consume;
pub mod doctor;
pub mod encode;
pub mod monitor;
pub mod produce;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read controller serial output and forward decoded commands to a renderer.
    Produce(ProduceArgs),
    /// Print controller serial output as human-readable lines.
    Monitor(MonitorArgs),
    /// Receive commands and drive the render state.
    Consume(ConsumeArgs),
    /// Turn JSON command records into controller frames (device simulator).
    Encode(EncodeArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Produce(args) => produce::run(args),
        Command::Monitor(args) => monitor::run(args),
        Command::Consume(args) => consume::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Integrity check applied to `V` payloads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChecksumArg {
    /// Accept every payload.
    #[default]
    None,
    /// CRC-16 (poly 0x8001) over the payload with the checksum field zeroed.
    Crc16,
}

impl ChecksumArg {
    pub fn policy(self) -> Box<dyn ChecksumPolicy> {
        match self {
            ChecksumArg::None => Box::new(Unchecked),
            ChecksumArg::Crc16 => Box::new(Crc16),
        }
    }

    pub fn decoder(self) -> CommandDecoder {
        CommandDecoder::with_boxed_checksum(self.policy())
    }
}

#[derive(Args, Debug)]
pub struct ProduceArgs {
    /// Serial byte source: a device node, a capture file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,
    /// Renderer endpoint (`udp://HOST:PORT` or `unix:///path`).
    #[arg(long, env = "WHIPWIRE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// Payload checksum policy.
    #[arg(long, value_enum, default_value_t)]
    pub checksum: ChecksumArg,
    /// Do not print monitor lines.
    #[arg(long, short = 'q')]
    pub quiet: bool,
    /// Launch `whipwire consume` on the same endpoint before reading input.
    #[arg(long)]
    pub spawn_consumer: bool,
    /// Time the spawned consumer gets to bind (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub head_start: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial byte source: a device node, a capture file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,
    /// Payload checksum policy.
    #[arg(long, value_enum, default_value_t)]
    pub checksum: ChecksumArg,
}

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Endpoint to bind (`udp://HOST:PORT` or `unix:///path`).
    #[arg(long, env = "WHIPWIRE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// Draw ticks per second.
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub fps: u32,
    /// Exit after N ticks instead of waiting for Ctrl-C.
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Number of channels.
    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    pub channels: usize,
    /// LEDs per channel.
    #[arg(long, default_value_t = DEFAULT_LEDS)]
    pub leds: usize,
    /// Repaint the strips on stdout whenever the state changes.
    #[arg(long)]
    pub live: bool,
    #[command(flatten)]
    pub resources: ResourceArgs,
}

#[derive(Args, Debug, Default)]
pub struct ResourceArgs {
    /// Directory holding `<source_id>.gif` files (`007.gif`).
    #[arg(long, env = "WHIPWIRE_GIF_DIR", value_name = "DIR")]
    pub gif_dir: Option<PathBuf>,
    /// Native game renderer library exporting `renderFlappyState`.
    #[arg(long, env = "WHIPWIRE_FLAPPY_LIB", value_name = "PATH")]
    pub flappy_lib: Option<PathBuf>,
    /// Do not try to load the native game renderer.
    #[arg(long, conflicts_with = "flappy_lib")]
    pub no_flappy: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON records, one per line. Defaults to stdin.
    #[arg(long, short = 'i', default_value = "-")]
    pub input: PathBuf,
    /// Checksum written into each `V` payload.
    #[arg(long, value_enum, default_value_t)]
    pub checksum: ChecksumArg,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub resources: ResourceArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_endpoint(value: &str) -> CliResult<Endpoint> {
    value
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

/// Open `path` for reading; `-` means stdin.
pub(crate) fn open_input(path: &Path) -> CliResult<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path)
        .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
    Ok(Box::new(BufReader::new(file)))
}
