//! Raw file pump - push raw frames from a file through a transform session.
//!
//! Frames are read from the input file, passed one at a time through a
//! software delay-line transform, and every non-empty payload is written to
//! the output file. On end of input (or Ctrl+C) the session is flushed so
//! held-back frames reach the output, then shut down.
//!
//! Usage:
//!   pump-file --input <file> --output <file> [options]
//!
//! Options:
//!   --input <file>          Raw NV12 input file (required)
//!   --output <file>         Output file (required)
//!   --width <px>            Frame width (default: 640)
//!   --height <px>           Frame height (default: 480)
//!   --fps <n>               Frame rate (default: 30)
//!   --delay <frames>        Frames held back by the transform (default: 2)
//!   --frames <n>            Stop after N frames (default: whole file)
//!   --background            Write output on a background worker

use anyhow::Result;
use framepump::codec::software::DelayLine;
use framepump::codec::{
    LifecycleState, MediaSubtype, PumpError, PumpOptions, StreamConfig, TransformSession,
};
use framepump::{BackgroundSink, FileSink, RawFileSource};
use tokio_util::sync::CancellationToken;

struct Args {
    input: String,
    output: String,
    width: u32,
    height: u32,
    fps: u32,
    delay: usize,
    frames: Option<u64>,
    background: bool,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut input = None;
    let mut output = None;
    let mut width = 640u32;
    let mut height = 480u32;
    let mut fps = 30u32;
    let mut delay = 2usize;
    let mut frames = None;
    let mut background = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" if i + 1 < args.len() => {
                input = Some(args[i + 1].clone());
                i += 2;
            }
            "--output" if i + 1 < args.len() => {
                output = Some(args[i + 1].clone());
                i += 2;
            }
            "--width" if i + 1 < args.len() => {
                width = parse_value("--width", &args[i + 1])?;
                i += 2;
            }
            "--height" if i + 1 < args.len() => {
                height = parse_value("--height", &args[i + 1])?;
                i += 2;
            }
            "--fps" if i + 1 < args.len() => {
                fps = parse_value("--fps", &args[i + 1])?;
                i += 2;
            }
            "--delay" if i + 1 < args.len() => {
                delay = parse_value("--delay", &args[i + 1])?;
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                frames = Some(parse_value("--frames", &args[i + 1])?);
                i += 2;
            }
            "--background" => {
                background = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown or incomplete argument '{}'", other);
                return None;
            }
        }
    }

    let Some(input) = input else {
        eprintln!("Error: --input is required");
        return None;
    };
    let Some(output) = output else {
        eprintln!("Error: --output is required");
        return None;
    };

    Some(Args {
        input,
        output,
        width,
        height,
        fps,
        delay,
        frames,
        background,
    })
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("Error: invalid value '{}' for {}", value, flag);
            None
        }
    }
}

fn print_usage() {
    println!("Usage: pump-file --input <file> --output <file> [options]");
    println!();
    println!("Options:");
    println!("  --input <file>          Raw NV12 input file (required)");
    println!("  --output <file>         Output file (required)");
    println!("  --width <px>            Frame width (default: 640)");
    println!("  --height <px>           Frame height (default: 480)");
    println!("  --fps <n>               Frame rate (default: 30)");
    println!("  --delay <frames>        Frames held back by the transform (default: 2)");
    println!("  --frames <n>            Stop after N frames (default: whole file)");
    println!("  --background            Write output on a background worker");
    println!();
    println!("Examples:");
    println!("  pump-file --input capture.yuv --output out.yuv");
    println!("  pump-file --input capture.yuv --output out.yuv --width 1280 --height 720 --background");
}

/// Pump every frame from `source` until input ends, the frame limit is
/// reached or `cancel` fires.
fn pump_frames(
    session: &TransformSession<DelayLine>,
    source: &mut RawFileSource,
    limit: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut dropped = 0u64;

    while let Some(frame) = source.next_frame()? {
        if cancel.is_cancelled() {
            tracing::info!("Cancelled, stopping frame loop");
            break;
        }

        loop {
            match session.process_frame(&frame) {
                Ok(payload) => {
                    if payload.format_changed {
                        tracing::info!("Output format changed at {}", frame.timestamp);
                    }
                    break;
                }
                // Not submitted; the same frame can go in again. Output
                // drained while waiting was already forwarded to the sink.
                Err(PumpError::Interrupted { .. }) => continue,
                Err(e @ PumpError::Saturated { .. }) => {
                    dropped += 1;
                    tracing::warn!("Dropping frame at {}: {}", frame.timestamp, e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if limit.is_some_and(|limit| source.frames_read() >= limit) {
            break;
        }
    }

    if dropped > 0 {
        tracing::warn!("{} frames dropped", dropped);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framepump=info".parse()?)
                .add_directive("framepump_codec=info".parse()?)
                .add_directive("pump_file=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let Some(args) = parse_args() else {
        print_usage();
        std::process::exit(1);
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received, stopping...");
        cancel_clone.cancel();
    });

    let config = StreamConfig::new(args.width, args.height)
        .input_subtype(MediaSubtype::Nv12)
        .output_subtype(MediaSubtype::Nv12)
        .framerate(args.fps, 1);

    println!();
    println!("========================================");
    println!("Frame Pump");
    println!("========================================");
    println!("Input:      {}", args.input);
    println!("Output:     {}", args.output);
    println!("Format:     {}x{} NV12 @ {} fps", args.width, args.height, args.fps);
    println!("Delay:      {} frames", args.delay);
    if let Some(n) = args.frames {
        println!("Frames:     {}", n);
    } else {
        println!("Frames:     whole file");
    }
    println!("Writer:     {}", if args.background { "background" } else { "inline" });
    println!("========================================");
    println!();

    let delay = args.delay;
    let session = TransformSession::new(move || Ok(DelayLine::new(delay)), PumpOptions::default());
    session.initialize(config.clone())?;

    let mut source = RawFileSource::open(&args.input, &config)?;
    let limit = args.frames;

    let file_sink = FileSink::create(&args.output)?;
    if args.background {
        session.set_sink(BackgroundSink::new(file_sink, 16)?);
    } else {
        session.set_sink(file_sink);
    }

    // The session and sinks block; keep them off the async workers.
    tokio::task::spawn_blocking(move || -> Result<()> {
        session.start()?;

        let pumped = pump_frames(&session, &mut source, limit, &cancel);

        if session.state() == LifecycleState::Streaming {
            match session.flush() {
                Ok(tail) => tracing::info!("Flushed {} bytes", tail.len()),
                Err(e) => tracing::error!("Flush failed: {}", e),
            }
        }
        let stats = session.stats();
        session.shutdown();

        println!();
        println!("Frames read:       {}", source.frames_read());
        println!("Frames submitted:  {}", stats.frames_submitted);
        println!("Frames w/ output:  {}", stats.frames_with_output);
        println!("Output units:      {}", stats.units_produced);
        println!("Output bytes:      {}", stats.bytes_produced);
        println!("Busy retries:      {}", stats.busy_retries);
        println!("Format changes:    {}", stats.format_changes);

        pumped
    })
    .await??;

    Ok(())
}
