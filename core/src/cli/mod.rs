pub mod report;

use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

use crate::types::PreprocessConfig;

/// Command-line arguments for mammoprep
#[derive(Parser, Debug)]
#[command(name = "mammoprep")]
#[command(about = "Build a mammography training dataset from DICOM images and exam metadata")]
#[command(version)]
pub struct Cli {
    /// Directory containing the DICOM images
    #[arg(value_name = "IMAGE_DIR")]
    pub image_dir: PathBuf,

    /// Images crosswalk (TSV)
    #[arg(value_name = "CROSSWALK")]
    pub crosswalk: PathBuf,

    /// Exams metadata (TSV)
    #[arg(value_name = "METADATA")]
    pub metadata: PathBuf,

    /// Output dataset (Parquet)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Number of parallel workers (defaults to the number of CPUs)
    #[arg(short, long, env = "NUM_CPU_CORES")]
    pub workers: Option<usize>,

    /// Rows buffered per write batch
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Keep per-worker chunk files after merging
    #[arg(long)]
    pub keep_temp: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    #[command(flatten)]
    pub preprocess: PreprocessArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Image normalization options shared by both tools
#[derive(Args, Debug, Clone)]
pub struct PreprocessArgs {
    /// Output image width and height
    #[arg(long, default_value_t = 224)]
    pub size: usize,

    /// Nominal maximum stored pixel value
    #[arg(long, default_value_t = 4095.0)]
    pub max_value: f32,

    /// Normalized values below this are floored to the range minimum
    #[arg(long, default_value_t = -90.0, allow_negative_numbers = true)]
    pub filter_threshold: f32,
}

impl From<&PreprocessArgs> for PreprocessConfig {
    fn from(args: &PreprocessArgs) -> Self {
        PreprocessConfig::default()
            .with_size(args.size)
            .with_max_value(args.max_value)
            .with_filter_threshold(args.filter_threshold)
    }
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}

/// Initializes env_logger; `RUST_LOG` still applies on top
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
