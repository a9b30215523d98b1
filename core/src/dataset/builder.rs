use crate::api::ImagePreprocessor;
use crate::error::{MammoprepError, Result};
use crate::preprocess::metadata::{ExamMetadata, METADATA_FIELD_COUNT};
use crate::types::{Laterality, PreprocessConfig};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::storage::{
    dataset_metadata, dataset_schema, merge_chunks, DatasetSummary, DatasetWriter, LabelStats,
};
use super::tsv::{read_crosswalk, read_metadata, CrosswalkEntry};

/// One dataset row before its image is normalized
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub subject_id: String,
    pub exam_index: String,
    pub laterality: Laterality,
    /// DICOM file name relative to the image directory
    pub filename: String,
    /// Cancer flag for this breast
    pub label: u8,
    pub meta: [f32; METADATA_FIELD_COUNT],
}

/// Settings for one dataset build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub image_dir: PathBuf,
    pub crosswalk: PathBuf,
    pub metadata: PathBuf,
    pub output: PathBuf,

    /// Number of parallel workers (and chunk files)
    pub workers: usize,

    /// Rows buffered by a worker before they are handed to the Parquet writer
    pub batch_size: usize,

    /// Maximum rows per Parquet row group
    pub row_group_size: usize,

    /// Leave worker chunk files on disk after merging
    pub keep_temp: bool,

    /// Draw a progress bar on stderr
    pub show_progress: bool,

    pub preprocess: PreprocessConfig,
}

impl BuildConfig {
    /// Creates a configuration with one worker per logical CPU
    pub fn new(
        image_dir: impl Into<PathBuf>,
        crosswalk: impl Into<PathBuf>,
        metadata: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            image_dir: image_dir.into(),
            crosswalk: crosswalk.into(),
            metadata: metadata.into(),
            output: output.into(),
            workers: num_cpus::get(),
            batch_size: 32,
            row_group_size: 256,
            keep_temp: false,
            show_progress: true,
            preprocess: PreprocessConfig::default(),
        }
    }

    /// Builder: Set worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder: Set rows per write batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder: Keep chunk files
    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Builder: Enable or disable the progress bar
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Builder: Set image normalization parameters
    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    /// Checks that the configuration can run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(MammoprepError::ConfigError(
                "worker count must be positive".to_string(),
            ));
        }
        if !self.image_dir.is_dir() {
            return Err(MammoprepError::ConfigError(format!(
                "{} is not a directory",
                self.image_dir.display()
            )));
        }
        self.preprocess
            .validate()
            .map_err(MammoprepError::ConfigError)
    }

    /// Path of worker `index`'s chunk file, next to the output
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        let dir = self
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        dir.join(format!("{}.tmp{}.parquet", stem, index))
    }
}

/// Pairs every crosswalk row with its exam metadata and breast label
///
/// Rows keep crosswalk order.
///
/// # Errors
///
/// Returns an error if a row's exam is missing from the metadata, its
/// laterality is not L or R, or its label does not fit in a byte.
pub fn assemble_samples(
    crosswalk: &[CrosswalkEntry],
    metadata: &HashMap<String, ExamMetadata>,
) -> Result<(Vec<Sample>, LabelStats)> {
    let mut stats = LabelStats::default();
    let samples = crosswalk
        .iter()
        .map(|entry| {
            let key = entry.exam_key();
            let exam = metadata
                .get(&key)
                .ok_or_else(|| MammoprepError::MissingMetadata(key.clone()))?;
            let laterality = entry.laterality();
            let label = exam.label(laterality).ok_or_else(|| {
                MammoprepError::InvalidValue(format!(
                    "{}: laterality '{}' is not L or R",
                    entry.filename, entry.laterality_code
                ))
            })?;
            let label = u8::try_from(label).map_err(|_| {
                MammoprepError::InvalidValue(format!("{}: label {} out of range", key, label))
            })?;
            stats.record(label);

            Ok(Sample {
                subject_id: entry.subject_id.clone(),
                exam_index: entry.exam_index.clone(),
                laterality,
                filename: entry.filename.clone(),
                label,
                meta: exam.features,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((samples, stats))
}

/// Rows between per-worker progress lines: a tenth of the chunk, at least one
pub fn progress_step(total: usize) -> usize {
    ((total as f64 / 10.0).round() as usize).max(1)
}

/// Whether the worker logs after finishing row `count` of `total`
///
/// Every `progress_step` rows, plus the last row.
pub fn logs_progress(count: usize, total: usize) -> bool {
    count % progress_step(total) == 0 || count == total
}

/// Checks the merged row count, removing a bad or partial output
fn verify_output(merged: Result<usize>, expected: usize, output: &Path) -> Result<usize> {
    let checked = merged.and_then(|rows| {
        if rows == expected {
            Ok(rows)
        } else {
            Err(MammoprepError::DataError(format!(
                "output has {} rows but the crosswalk lists {} images",
                rows, expected
            )))
        }
    });
    if checked.is_err() {
        remove_files(&[output.to_path_buf()]);
    }
    checked
}

/// Rows per worker: `ceil(total / workers)`
pub fn chunk_size(total: usize, workers: usize) -> usize {
    total.div_ceil(workers.max(1))
}

/// Builds the training dataset from a crosswalk, exam metadata and images
pub struct DatasetBuilder {
    config: BuildConfig,
    preprocessor: ImagePreprocessor,
}

impl DatasetBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let preprocessor = ImagePreprocessor::new(config.preprocess);
        Self {
            config,
            preprocessor,
        }
    }

    /// Runs the full build
    ///
    /// 1. Read exam metadata and the crosswalk, pair rows with labels
    /// 2. Split rows into `workers` consecutive chunks
    /// 3. Each worker normalizes its chunk into its own chunk file
    /// 4. Concatenate chunk files in worker order into the output
    /// 5. Verify the output row count against the crosswalk
    pub fn build(&self) -> Result<DatasetSummary> {
        let config = &self.config;
        config.validate()?;

        let metadata = read_metadata(&config.metadata, config.preprocess.expected_max as f64)?;
        let crosswalk = read_crosswalk(&config.crosswalk)?;
        if crosswalk.is_empty() {
            return Err(MammoprepError::DataError(format!(
                "{} lists no images",
                config.crosswalk.display()
            )));
        }

        let (samples, stats) = assemble_samples(&crosswalk, &metadata)?;
        let ratio = stats.positive_ratio()?;
        info!(
            "{} images: {} positive, {} negative (ratio {:.4})",
            samples.len(),
            stats.positive,
            stats.negative,
            ratio
        );

        let chunk_paths = self.write_chunks(&samples)?;

        let merged = merge_chunks(
            &chunk_paths,
            &config.output,
            dataset_metadata(&config.preprocess, &stats, ratio),
            config.row_group_size,
        );
        if !config.keep_temp {
            remove_files(&chunk_paths);
        }
        let rows = verify_output(merged, samples.len(), &config.output)?;
        info!("Wrote {} rows to {}", rows, config.output.display());

        Ok(DatasetSummary {
            path: config.output.clone(),
            rows,
            image_shape: config.preprocess.shape(),
            meta_fields: crate::preprocess::metadata::field_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            stats,
            positive_ratio: ratio,
        })
    }

    /// Fans samples out to the worker pool; returns chunk files in worker order
    fn write_chunks(&self, samples: &[Sample]) -> Result<Vec<PathBuf>> {
        let config = &self.config;
        let chunk = chunk_size(samples.len(), config.workers);
        let chunk_count = samples.len().div_ceil(chunk);
        let chunk_paths: Vec<PathBuf> = (0..chunk_count).map(|i| config.chunk_path(i)).collect();
        info!(
            "Processing {} images with {} workers ({} per chunk)",
            samples.len(),
            chunk_count,
            chunk
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("mammoprep-worker-{}", i))
            .build()
            .map_err(|e| MammoprepError::ConfigError(format!("cannot start workers: {}", e)))?;

        let progress = self.progress_bar(samples.len() as u64);
        let results: Vec<Result<usize>> = pool.install(|| {
            samples
                .par_chunks(chunk)
                .zip(chunk_paths.par_iter())
                .map(|(rows, path)| self.write_chunk(rows, path, &progress))
                .collect()
        });
        progress.finish_and_clear();

        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            remove_files(&chunk_paths);
            return Err(err);
        }
        Ok(chunk_paths)
    }

    /// Normalizes one chunk in order and writes it to `path`
    fn write_chunk(&self, samples: &[Sample], path: &Path, progress: &ProgressBar) -> Result<usize> {
        let config = &self.config;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let schema = Arc::new(dataset_schema(&config.preprocess));
        let mut writer = DatasetWriter::create(
            path,
            schema,
            config.preprocess.image_len(),
            config.batch_size,
            config.row_group_size,
        )?;

        let total = samples.len();
        for (count, sample) in samples.iter().enumerate().map(|(i, s)| (i + 1, s)) {
            let file = config.image_dir.join(&sample.filename);
            let image = self
                .preprocessor
                .preprocess_file(&file, sample.laterality)
                .map_err(|e| annotate(e, &file))?;
            let values = image.pixels.as_standard_layout();
            let values = values.as_slice().ok_or_else(|| {
                MammoprepError::PixelDataError(format!(
                    "{}: normalized image is not contiguous",
                    file.display()
                ))
            })?;
            writer.append(sample, values)?;

            progress.inc(1);
            if logs_progress(count, total) {
                info!("{}: {}/{}", name, count, total);
            }
        }

        let rows = writer.close()?;
        debug!("{} closed with {} rows", name, rows);
        Ok(rows)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        match ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} images ({eta})",
        ) {
            Ok(style) => bar.set_style(style),
            Err(e) => warn!("Using default progress style: {}", e),
        }
        bar
    }
}

/// Prefixes pixel-level errors with the offending file
fn annotate(err: MammoprepError, file: &Path) -> MammoprepError {
    match err {
        MammoprepError::EmptyImage => {
            MammoprepError::PixelDataError(format!("{}: image is entirely zero", file.display()))
        }
        MammoprepError::PixelDataError(msg) => {
            MammoprepError::PixelDataError(format!("{}: {}", file.display(), msg))
        }
        MammoprepError::DicomError(msg) => {
            MammoprepError::DicomError(format!("{}: {}", file.display(), msg))
        }
        other => other,
    }
}

fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::StringRecord;
    use rstest::rstest;

    fn exam(subject: &str, exam: &str, cancer_l: &str, cancer_r: &str) -> ExamMetadata {
        ExamMetadata::from_row(
            &StringRecord::from(vec![subject, exam, "0", cancer_l, cancer_r]),
            100.0,
        )
    }

    fn entry(subject: &str, laterality: &str, filename: &str) -> CrosswalkEntry {
        CrosswalkEntry {
            subject_id: subject.to_string(),
            exam_index: "1".to_string(),
            image_index: "1".to_string(),
            view: "CC".to_string(),
            laterality_code: laterality.to_string(),
            filename: filename.to_string(),
        }
    }

    fn metadata() -> HashMap<String, ExamMetadata> {
        [exam("1", "1", "1", "0"), exam("2", "1", "0", "0")]
            .into_iter()
            .map(|e| (e.key(), e))
            .collect()
    }

    #[rstest]
    #[case(10, 4, 3)]
    #[case(8, 4, 2)]
    #[case(3, 8, 1)]
    #[case(1, 1, 1)]
    #[case(0, 4, 0)]
    fn test_chunk_size(#[case] total: usize, #[case] workers: usize, #[case] expected: usize) {
        assert_eq!(chunk_size(total, workers), expected);
    }

    #[rstest]
    #[case(1, vec![1])]
    #[case(4, vec![1, 2, 3, 4])]
    #[case(10, (1..=10).collect())]
    #[case(15, vec![2, 4, 6, 8, 10, 12, 14, 15])]
    #[case(25, vec![3, 6, 9, 12, 15, 18, 21, 24, 25])]
    fn test_progress_lines(#[case] total: usize, #[case] expected: Vec<usize>) {
        let logged: Vec<usize> = (1..=total).filter(|&c| logs_progress(c, total)).collect();
        assert_eq!(logged, expected);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(4, 1)]
    #[case(15, 2)]
    #[case(3000, 300)]
    fn test_progress_step(#[case] total: usize, #[case] expected: usize) {
        assert_eq!(progress_step(total), expected);
    }

    #[test]
    fn test_verify_output_keeps_matching_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output = temp_dir.path().join("train.parquet");
        std::fs::write(&output, b"rows").unwrap();

        assert_eq!(verify_output(Ok(5), 5, &output).unwrap(), 5);
        assert!(output.exists());
    }

    #[test]
    fn test_verify_output_removes_short_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output = temp_dir.path().join("train.parquet");
        std::fs::write(&output, b"rows").unwrap();

        let result = verify_output(Ok(3), 5, &output);
        assert!(matches!(result, Err(MammoprepError::DataError(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_verify_output_removes_file_after_failed_merge() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output = temp_dir.path().join("train.parquet");
        std::fs::write(&output, b"partial").unwrap();

        let merged = Err(MammoprepError::DataError("chunk schema mismatch".to_string()));
        assert!(verify_output(merged, 5, &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_assemble_samples_labels_by_breast() {
        let crosswalk = vec![
            entry("1", "L", "a.dcm"),
            entry("1", "R", "b.dcm"),
            entry("2", "l", "c.dcm"),
        ];

        let (samples, stats) = assemble_samples(&crosswalk, &metadata()).unwrap();

        let labels: Vec<u8> = samples.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![1, 0, 0]);
        assert_eq!(samples[2].laterality, Laterality::Left);
        assert_eq!(stats.positive, 1);
        assert_eq!(stats.negative, 2);
    }

    #[test]
    fn test_assemble_samples_missing_exam() {
        let crosswalk = vec![entry("9", "L", "a.dcm")];
        let result = assemble_samples(&crosswalk, &metadata());
        assert!(matches!(result, Err(MammoprepError::MissingMetadata(key)) if key == "9_1"));
    }

    #[test]
    fn test_assemble_samples_bad_laterality() {
        let crosswalk = vec![entry("1", "B", "a.dcm")];
        let result = assemble_samples(&crosswalk, &metadata());
        assert!(matches!(result, Err(MammoprepError::InvalidValue(_))));
    }

    #[test]
    fn test_chunk_path_next_to_output() {
        let config = BuildConfig::new("imgs", "cw.tsv", "meta.tsv", "/data/out/train.parquet");
        assert_eq!(
            config.chunk_path(3),
            PathBuf::from("/data/out/train.tmp3.parquet")
        );

        let bare = BuildConfig::new("imgs", "cw.tsv", "meta.tsv", "train.parquet");
        assert_eq!(bare.chunk_path(0), PathBuf::from("./train.tmp0.parquet"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = BuildConfig::new(temp_dir.path(), "cw.tsv", "meta.tsv", "out.parquet")
            .with_workers(0);
        assert!(matches!(
            config.validate(),
            Err(MammoprepError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_image_dir() {
        let config = BuildConfig::new("/nonexistent/images", "cw.tsv", "meta.tsv", "out.parquet");
        assert!(config.validate().is_err());
    }
}
