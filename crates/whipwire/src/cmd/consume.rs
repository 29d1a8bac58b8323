use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use whipwire_render::{GifDirectory, GifFrameCache, Layout, NativeFlappyRenderer, RenderState};
use whipwire_transport::CommandReceiver;

use crate::cmd::{parse_endpoint, ConsumeArgs, ResourceArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{self, ConsumeSummary, OutputFormat};

pub fn run(args: ConsumeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.channels == 0 || args.leds == 0 {
        return Err(CliError::new(USAGE, "--channels and --leds must be non-zero"));
    }
    let endpoint = parse_endpoint(&args.endpoint)?;
    let layout = Layout::new(args.channels, args.leds);
    let mut state = build_state(layout, &args.resources);

    let mut receiver =
        CommandReceiver::bind(&endpoint).map_err(|err| transport_error("bind failed", err))?;
    info!(
        endpoint = %receiver.endpoint(),
        channels = layout.channels,
        leds = layout.leds,
        fps = args.fps,
        "consuming"
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let tick = Duration::from_secs(1) / args.fps;
    let mut summary = ConsumeSummary {
        endpoint: receiver.endpoint().to_string(),
        ..ConsumeSummary::default()
    };

    while running.load(Ordering::SeqCst) {
        if args.ticks.is_some_and(|limit| summary.ticks >= limit) {
            break;
        }
        let started = Instant::now();

        let mut changed = false;
        for cmd in receiver.drain() {
            summary.commands += 1;
            changed |= state.apply(&cmd);
        }
        summary.ticks += 1;

        if args.live && changed {
            print!("\x1b[H\x1b[2J");
            output::print_strips(&state);
        }

        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    summary.malformed = receiver.malformed();
    let stats = receiver.stats();
    debug!(
        datagrams = stats.datagrams_received,
        bytes = stats.bytes_received,
        oversized = stats.oversized,
        recv_errors = stats.recv_errors,
        "consumer stopped"
    );
    output::print_snapshot(&state, &summary, format);
    Ok(SUCCESS)
}

fn build_state(layout: Layout, resources: &ResourceArgs) -> RenderState {
    let gifs = match &resources.gif_dir {
        Some(dir) => GifFrameCache::new(GifDirectory::new(dir), layout),
        None => GifFrameCache::disabled(layout),
    };
    let state = RenderState::new(layout, gifs);
    if resources.no_flappy {
        return state;
    }
    match NativeFlappyRenderer::detect(resources.flappy_lib.as_deref()) {
        Some(renderer) => state.with_game_renderer(Box::new(renderer)),
        None => state,
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
