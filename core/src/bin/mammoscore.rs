use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use mammoprep_core::cli::{setup_logging, PreprocessArgs};
use mammoprep_core::dataset::read_crosswalk;
use mammoprep_core::inference::{score_crosswalk, write_predictions, PREDICTIONS_PATH};
use mammoprep_core::{ImagePreprocessor, OnnxClassifier, PreprocessConfig, Result};
use std::path::PathBuf;
use std::process;

/// CLI tool for scoring mammograms with a pre-trained classifier
#[derive(Parser, Debug)]
#[command(name = "mammoscore")]
#[command(about = "Score every image in a crosswalk with an ONNX cancer classifier")]
#[command(version)]
struct Cli {
    /// Directory containing the DICOM images
    #[arg(value_name = "IMAGE_DIR")]
    image_dir: PathBuf,

    /// Images crosswalk (TSV)
    #[arg(value_name = "CROSSWALK")]
    crosswalk: PathBuf,

    /// ONNX model taking [1, channels, size, size] input
    #[arg(value_name = "MODEL")]
    model: PathBuf,

    /// Predictions output (TSV)
    #[arg(value_name = "PREDICTIONS", default_value = PREDICTIONS_PATH)]
    predictions: PathBuf,

    #[command(flatten)]
    preprocess: PreprocessArgs,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("Scoring failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = PreprocessConfig::from(&cli.preprocess);
    info!(
        "Expected min/max: ({}, {})",
        config.expected_min(),
        config.expected_max
    );
    info!("Filter threshold: {}", config.filter_threshold);

    let classifier = OnnxClassifier::load(&cli.model, &config)?;
    let entries = read_crosswalk(&cli.crosswalk)?;
    info!("Scoring {} images", entries.len());

    let progress = if cli.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(entries.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len}")
        {
            bar.set_style(style);
        }
        bar
    };

    let preprocessor = ImagePreprocessor::new(config);
    let predictions = score_crosswalk(
        &entries,
        &cli.image_dir,
        &preprocessor,
        &classifier,
        &progress,
    )?;
    progress.finish_and_clear();

    write_predictions(&cli.predictions, &predictions)?;
    info!(
        "Wrote {} predictions to {}",
        predictions.len(),
        cli.predictions.display()
    );
    Ok(())
}
