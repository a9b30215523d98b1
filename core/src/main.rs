use clap::Parser;
use log::{error, info};
use mammoprep_core::cli::{setup_logging, Cli, OutputFormat};
use mammoprep_core::{BuildConfig, DatasetBuilder, DatasetSummary, PreprocessConfig, TextReport};
use std::process;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let preprocess = PreprocessConfig::from(&cli.preprocess);
    info!(
        "Expected min/max: ({}, {})",
        preprocess.expected_min(),
        preprocess.expected_max
    );
    info!("Filter threshold: {}", preprocess.filter_threshold);

    let mut config = BuildConfig::new(
        &cli.image_dir,
        &cli.crosswalk,
        &cli.metadata,
        &cli.output,
    )
    .with_batch_size(cli.batch_size)
    .keep_temp(cli.keep_temp)
    .show_progress(!cli.no_progress)
    .with_preprocess(preprocess);
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }

    let summary = match DatasetBuilder::new(config).build() {
        Ok(summary) => summary,
        Err(e) => {
            error!("Dataset build failed: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    output_summary(&summary, cli.format);
}

fn output_summary(summary: &DatasetSummary, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TextReport::new(summary));
        }
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match serde_json::to_string_pretty(summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize to JSON: {}", e);
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(1);
            }
        }
    }
}
