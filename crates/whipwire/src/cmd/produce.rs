use std::process::{Child, Command as Process, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};
use whipwire_command::MonitorFilter;
use whipwire_frame::FrameReader;
use whipwire_transport::CommandSender;

use crate::cmd::{open_input, parse_endpoint, ProduceArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: ProduceArgs) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let head_start = parse_duration(&args.head_start)?;

    let mut consumer = if args.spawn_consumer {
        let child = spawn_consumer(&args.endpoint)?;
        debug!(?head_start, "waiting for consumer to bind");
        std::thread::sleep(head_start);
        Some(child)
    } else {
        None
    };

    let mut sender =
        CommandSender::connect(&endpoint).map_err(|err| transport_error("connect failed", err))?;
    let mut monitor = MonitorFilter::new(args.checksum.decoder()).forwarding();
    let mut reader = FrameReader::new(open_input(&args.input)?);
    info!(endpoint = %endpoint, input = %args.input.display(), "producing");

    let mut outcome = Ok(SUCCESS);
    for result in reader.by_ref() {
        let frame = match result {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "input read failed; stopping");
                outcome = Err(frame_error("read failed", err));
                break;
            }
        };
        let line = monitor.handle_frame(&frame);
        if !args.quiet {
            println!("{line}");
        }

        for cmd in monitor.take_commands() {
            match sender.send(&cmd) {
                Ok(true) => {}
                Ok(false) => debug!(command = cmd.name(), "not forwarded"),
                Err(err) => warn!(error = %err, command = cmd.name(), "send failed; dropped"),
            }
        }
    }

    let parsed = reader.stats();
    let sent = sender.stats();
    info!(
        frames = parsed.frames,
        discarded_bytes = parsed.discarded_bytes,
        rejected_markers = parsed.rejected_markers,
        bad_trailers = parsed.bad_trailers,
        datagrams_sent = sent.datagrams_sent,
        send_errors = sent.send_errors,
        "input closed"
    );

    reap(consumer.as_mut(), outcome)
}

/// Waits for a spawned consumer before handing back the loop's outcome, so
/// a failed read never leaves the child running unattended.
fn reap(consumer: Option<&mut Child>, outcome: CliResult<i32>) -> CliResult<i32> {
    if let Some(child) = consumer {
        info!("waiting for consumer to exit (Ctrl-C to stop)");
        let status = child
            .wait()
            .map_err(|err| io_error("consumer wait failed", err))?;
        debug!(%status, "consumer exited");
    }
    outcome
}

fn spawn_consumer(endpoint: &str) -> CliResult<Child> {
    let exe = std::env::current_exe().map_err(|err| io_error("cannot locate executable", err))?;
    let child = Process::new(exe)
        .args(["consume", "--endpoint", endpoint])
        .stdin(Stdio::null())
        .spawn()
        .map_err(|err| io_error("cannot spawn consumer", err))?;
    info!(pid = child.id(), endpoint, "consumer spawned");
    Ok(child)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
