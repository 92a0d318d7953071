use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use motion_recorder_core::{
    JsonLinesEventLog, MotionRecorder, RecorderConfig, RecorderError, Y4mFrameSource, Y4mSegmentWriter,
};
use signal_hook::consts::{SIGINT, SIGTERM};
use thiserror::Error;

const WATCHDOG_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error("failed to install signal handler: {0}")]
    Signal(io::Error),

    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "motion-recorder")]
#[command(about = "Record video segments when motion is detected")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a YUV4MPEG2 stream and record motion segments
    Run {
        /// Path to JSON config file (missing fields use defaults)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Y4M input file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Override recording.output_directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Event log file [default: <output>/events.jsonl]
        #[arg(long)]
        events: Option<PathBuf>,

        /// Deliver file input at its nominal frame rate
        #[arg(long)]
        realtime: bool,

        /// Treat stdin as a live camera feed: drop frames the writer cannot
        /// keep up with instead of slowing the producer down
        #[arg(long)]
        live: bool,
    },

    /// Validate a config file and print the effective settings
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List recorded motion events
    Events {
        /// Event log file
        #[arg(short, long, default_value = "recordings/events.jsonl")]
        log: PathBuf,

        /// Only count today's events
        #[arg(long)]
        today: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();

    match args.command {
        Commands::Run {
            config,
            input,
            output,
            events,
            realtime,
            live,
        } => {
            let mut config = match config {
                Some(path) => RecorderConfig::from_json_file(&path)?,
                None => RecorderConfig::default(),
            };
            if let Some(output) = output {
                config.recording.output_directory = output;
            }
            let events = events.unwrap_or_else(|| config.recording.output_directory.join("events.jsonl"));

            if input == "-" {
                let mut source = Y4mFrameSource::new(io::stdin())?;
                if live {
                    source = source.live();
                }
                record(config, source, &events)
            } else {
                let mut source = Y4mFrameSource::open(Path::new(&input))?;
                if realtime {
                    source = source.realtime();
                }
                record(config, source, &events)
            }
        }

        Commands::CheckConfig { config } => {
            let config = RecorderConfig::from_json_file(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!(
                "Pre-roll: {} frames, cool-down: {:.1}s",
                config.recording.pre_buffer_frames(),
                config.recording.post_motion_timeout_secs
            );
            Ok(())
        }

        Commands::Events { log, today } => {
            let event_log = JsonLinesEventLog::new(log);
            if today {
                println!("{}", event_log.event_count_today()?);
                return Ok(());
            }

            let events = event_log.events()?;
            for event in &events {
                println!(
                    "{}  {:>6.1}s  {:>5} frames  {:>10} bytes  {}{}",
                    event.start_time.format("%Y-%m-%d %H:%M:%S"),
                    event.duration_secs(),
                    event.frame_count,
                    event.size_bytes,
                    event.path.display(),
                    if event.partial { "  (partial)" } else { "" }
                );
            }
            println!("{} events", events.len());
            Ok(())
        }
    }
}

fn record<R: Read + Send + 'static>(
    config: RecorderConfig,
    source: Y4mFrameSource<R>,
    events_path: &Path,
) -> Result<(), CliError> {
    let stall_timeout = config.recording.stall_timeout();
    let events = Arc::new(JsonLinesEventLog::new(events_path));

    let mut recorder = MotionRecorder::new(config, source, Y4mSegmentWriter::new(), events)?;

    let shutdown: Arc<AtomicBool> = recorder.shutdown_flag();
    for signal in [SIGINT, SIGTERM] {
        // A second signal exits immediately, e.g. when stdin is blocked.
        signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(&shutdown))
            .map_err(CliError::Signal)?;
        signal_hook::flag::register(signal, Arc::clone(&shutdown)).map_err(CliError::Signal)?;
    }

    recorder.start()?;
    log::info!("Recording to {}, press Ctrl+C to stop", recorder.config().recording.output_directory.display());

    let started = Instant::now();
    let mut stalled = false;
    while recorder.is_running() && !shutdown.load(Ordering::SeqCst) {
        thread::sleep(WATCHDOG_INTERVAL);

        let overdue = !recorder.is_stream_healthy() && started.elapsed() >= stall_timeout;
        if overdue && !stalled {
            log::warn!("No frames received for {:.0}s", stall_timeout.as_secs_f64());
        } else if !overdue && stalled {
            log::info!("Frame stream recovered");
        }
        stalled = overdue;
    }

    if shutdown.load(Ordering::SeqCst) {
        log::info!("Shutdown requested");
    }
    recorder.stop();

    let diagnostics = recorder.diagnostics();
    println!(
        "{} frames captured, {} segments recorded, {} frames dropped",
        diagnostics.frames_captured, diagnostics.segments_finalized, diagnostics.frames_dropped
    );
    Ok(())
}
