use std::io::{ErrorKind, Read, Write};

use tracing::info;
use whipwire_command::MonitorFilter;

use crate::cmd::{open_input, MonitorArgs};
use crate::exit::{io_error, CliResult, SUCCESS};

const READ_CHUNK_SIZE: usize = 4 * 1024;

pub fn run(args: MonitorArgs) -> CliResult<i32> {
    let mut input = open_input(&args.input)?;
    let mut monitor = MonitorFilter::new(args.checksum.decoder());
    let mut stdout = std::io::stdout().lock();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let read = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read failed", err)),
        };

        let lines = monitor.rx(&chunk[..read]);
        if lines.is_empty() {
            continue;
        }
        match stdout.write_all(lines.as_bytes()).and_then(|()| stdout.flush()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::BrokenPipe => return Ok(SUCCESS),
            Err(err) => return Err(io_error("write failed", err)),
        }
    }

    let stats = monitor.parser().stats();
    info!(
        frames = stats.frames,
        discarded_bytes = stats.discarded_bytes,
        rejected_markers = stats.rejected_markers,
        bad_trailers = stats.bad_trailers,
        pending = monitor.parser().buffered(),
        "input closed"
    );
    Ok(SUCCESS)
}
