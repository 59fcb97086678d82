use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use facewatch_core::capture::domain::display_sink::DisplaySink;
use facewatch_core::capture::domain::stream_source::StreamSource;
use facewatch_core::capture::infrastructure::image_directory_source::ImageDirectorySource;
use facewatch_core::capture::infrastructure::json_lines_source::JsonLinesSource;
use facewatch_core::capture::infrastructure::log_display_sink::LogDisplaySink;
use facewatch_core::capture::infrastructure::snapshot_display_sink::SnapshotDisplaySink;
use facewatch_core::events::infrastructure::image_file_event_sink::ImageFileEventSink;
use facewatch_core::pipeline::infrastructure::threaded_stream_executor::ThreadedStreamExecutor;
use facewatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facewatch_core::pipeline::session_config::SessionConfig;
use facewatch_core::pipeline::watch_use_case::WatchUseCase;
use facewatch_core::recognition::domain::embedding_store::EmbeddingStore;
use facewatch_core::recognition::infrastructure::json_embedding_store::JsonEmbeddingStore;
use facewatch_core::synchronization::domain::stream_record::StreamKind;

/// How long a replayed stream may run a full window ahead of the others.
const REPLAY_MAX_STALL: Duration = Duration::from_secs(2);

/// Face identity tracking over synchronized capture streams.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded capture through identity matching and event saving.
    Run(RunArgs),
    /// List enrolled identities and their reference counts.
    Labels {
        /// Identity database directory.
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Print the effective session configuration as JSON.
    Config(SessionArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Directory of frames named by sequence id (e.g. 000042.png).
    #[arg(long)]
    frames_dir: PathBuf,

    /// JSON-lines file of detection records.
    #[arg(long)]
    detections: PathBuf,

    /// JSON-lines file of embedding records.
    #[arg(long)]
    embeddings: PathBuf,

    /// Keep the latest annotated frame in this image file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,
}

/// Session settings; flags override values from `--config`.
#[derive(Args)]
struct SessionArgs {
    /// JSON session configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identity database directory.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory for saved event crops.
    #[arg(long)]
    events_dir: Option<PathBuf>,

    /// Enroll unknown faces under this name instead of a generated label.
    #[arg(long)]
    name: Option<String>,

    /// Observations of a new identity before its first event.
    #[arg(long)]
    skip_init_det: Option<u32>,

    /// Seconds between repeated events for the same identity.
    #[arg(long)]
    time_new_det: Option<f64>,

    /// Similarity at or below which a face is unknown (0.0-1.0).
    #[arg(long)]
    unknown_threshold: Option<f64>,

    /// Similarity above which a match is confirmed (0.0-1.0).
    #[arg(long)]
    confirmed_threshold: Option<f64>,

    /// Match only every Nth face (1 = every face).
    #[arg(long)]
    recognize_every: Option<u32>,

    /// Display only every Nth processed frame.
    #[arg(long)]
    display_every: Option<u32>,

    /// Side of the square display image in pixels.
    #[arg(long)]
    display_size: Option<u32>,

    /// Capture frame rate of the recording; event timing follows it.
    #[arg(long)]
    fps: Option<f64>,

    /// Factor the face box is grown by for saved crops.
    #[arg(long)]
    crop_scale: Option<f64>,

    /// Disable the display.
    #[arg(long)]
    no_display: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Run(args) => run_session(args),
        Command::Labels { database } => list_labels(database),
        Command::Config(args) => {
            let config = session_config(&args)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate(&args)?;
    let config = session_config(&args.session)?;

    let database_dir = config.database_dir();
    let events_dir = config.events_dir();
    log::info!("Identity database: {}", database_dir.display());
    log::info!("Event crops: {}", events_dir.display());

    let store = JsonEmbeddingStore::open(&database_dir)?;
    let sources: Vec<Box<dyn StreamSource>> = vec![
        Box::new(ImageDirectorySource::open(&args.frames_dir)?),
        Box::new(JsonLinesSource::open(&args.detections, StreamKind::Detections)?),
        Box::new(JsonLinesSource::open(&args.embeddings, StreamKind::Embeddings)?),
    ];
    let display: Box<dyn DisplaySink> = match args.snapshot {
        Some(path) => Box::new(SnapshotDisplaySink::new(path, config.display_size)),
        None => Box::new(LogDisplaySink::new()),
    };

    let mut use_case = WatchUseCase::new(
        &config,
        Box::new(store),
        sources,
        Box::new(ImageFileEventSink::new(&events_dir)),
        Some(display),
        Box::new(ThreadedStreamExecutor::new()),
        Box::new(StdoutPipelineLogger::new(100)),
        None,
    )?
    .with_replay_pacing(REPLAY_MAX_STALL);

    let report = use_case.execute()?;
    log::info!(
        "Saved {} of {} events to {}",
        report.events_saved,
        report.events_fired,
        events_dir.display()
    );
    if report.sync.gaps > 0 || report.sync.malformed > 0 {
        log::warn!(
            "{} incomplete and {} malformed sequence(s) were skipped",
            report.sync.gaps,
            report.sync.malformed
        );
    }
    Ok(())
}

fn list_labels(database: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = SessionConfig {
        database_dir: database,
        ..SessionConfig::default()
    };
    let store = JsonEmbeddingStore::open(&config.database_dir())?;
    let gallery = store.load()?;
    if gallery.is_empty() {
        log::info!("No identities in {}", store.dir().display());
    }
    for (label, references) in &gallery {
        println!("{label}\t{}", references.len());
    }
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied.
fn session_config(args: &SessionArgs) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    if let Some(dir) = &args.database {
        config.database_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.events_dir {
        config.events_dir = Some(dir.clone());
    }
    if let Some(name) = &args.name {
        config.identity_name = Some(name.clone());
    }
    if let Some(n) = args.skip_init_det {
        config.warm_up_count = n;
    }
    if let Some(secs) = args.time_new_det {
        config.cooldown_secs = secs;
    }
    if let Some(t) = args.unknown_threshold {
        config.thresholds.unknown = t;
    }
    if let Some(t) = args.confirmed_threshold {
        config.thresholds.confirmed = t;
    }
    if let Some(n) = args.recognize_every {
        config.recognize_every = n;
    }
    if let Some(n) = args.display_every {
        config.display_every = n;
    }
    if let Some(size) = args.display_size {
        config.display_size = size;
    }
    if let Some(fps) = args.fps {
        config.replay_fps = fps;
    }
    if let Some(scale) = args.crop_scale {
        config.crop_scale = scale;
    }
    if args.no_display {
        config.show_display = false;
    }

    config.validate()?;
    Ok(config)
}

fn validate(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.frames_dir.is_dir() {
        return Err(format!("Frames directory not found: {}", args.frames_dir.display()).into());
    }
    for path in [&args.detections, &args.embeddings] {
        require_file(path)?;
    }
    Ok(())
}

fn require_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    Ok(())
}
