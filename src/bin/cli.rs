//! CLI for posture data collection.
//!
//! Usage:
//!   posture-collect collect --label correct --input session.jsonl     # Record one run
//!   posture-collect collect --label too_far --frames 200 --input s.jsonl --outdir data
//!   posture-collect prepare --data-dir ml/data --out ml/data/dataset.csv

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use posture_collect::replay::{RecordedDetector, RecordedStream};
use posture_collect::{assemble_dataset, CollectionConfig, CollectionPipeline, StopSignal};

#[derive(Parser, Debug)]
#[command(name = "posture-collect")]
#[command(author, version, about = "Facial posture feature collection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record one labeled run from a recorded detection stream
    Collect(CollectArgs),
    /// Merge the per-label files into one training dataset
    Prepare(PrepareArgs),
}

#[derive(Parser, Debug)]
struct CollectArgs {
    /// Posture label for every frame of this run
    #[arg(long, value_enum)]
    label: Label,

    /// Recorded detections (JSON Lines, one frame per line)
    #[arg(long)]
    input: PathBuf,

    /// Frames to record (default: 100)
    #[arg(long)]
    frames: Option<u64>,

    /// Output directory for the CSV files (default: ml/data)
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// JSON file with collection settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Landmarks per face in the recording, checked before the run starts
    #[arg(long)]
    landmarks: Option<usize>,
}

#[derive(Parser, Debug)]
struct PrepareArgs {
    /// Directory holding the per-label CSV files
    #[arg(long, default_value = "ml/data")]
    data_dir: PathBuf,

    /// Output dataset file
    #[arg(long, default_value = "ml/data/dataset.csv")]
    out: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum Label {
    Correct,
    TooClose,
    TooFar,
    HeadLeft,
    HeadRight,
    HeadUp,
    HeadDown,
}

impl Label {
    fn as_str(self) -> &'static str {
        match self {
            Label::Correct => "correct",
            Label::TooClose => "too_close",
            Label::TooFar => "too_far",
            Label::HeadLeft => "head_left",
            Label::HeadRight => "head_right",
            Label::HeadUp => "head_up",
            Label::HeadDown => "head_down",
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Collect(args) => run_collect(&args),
        Command::Prepare(args) => run_prepare(&args),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_collect(args: &CollectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => CollectionConfig::load(path)?,
        None => CollectionConfig::default(),
    };
    config.label = args.label.as_str().to_string();
    config.capture_source_id = args.input.display().to_string();
    if let Some(frames) = args.frames {
        config.frame_target = frames;
    }
    if let Some(outdir) = &args.outdir {
        config.output_directory = outdir.clone();
    }

    let stream = RecordedStream::open(&args.input)?;
    let detector = match args.landmarks {
        Some(count) => RecordedDetector::new().with_landmark_count(count),
        None => RecordedDetector::new(),
    };

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.trigger())?;

    let mut pipeline = CollectionPipeline::new(config, stream, detector).with_stop_signal(stop);
    let report = pipeline.run()?;

    println!(
        "run {} ({}): {} frames, {:?}, summary {}",
        report.run_id,
        report.label,
        report.collected,
        report.termination,
        if report.summary_written { "written" } else { "skipped" }
    );
    Ok(())
}

fn run_prepare(args: &PrepareArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = assemble_dataset(&args.data_dir, &args.out)?;
    println!(
        "saved: {}  rows={} dropped={}",
        args.out.display(),
        report.rows_kept,
        report.rows_dropped
    );
    Ok(())
}
