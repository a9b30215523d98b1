//! Per-image cancer confidence scoring
//!
//! Every crosswalk image goes through the same normalization as the
//! training dataset and is scored by a [`Classifier`].

mod onnx;

pub use onnx::OnnxClassifier;

use crate::api::ImagePreprocessor;
use crate::dataset::CrosswalkEntry;
use crate::error::Result;
use csv::WriterBuilder;
use indicatif::ProgressBar;
use log::debug;
use ndarray::ArrayView3;
use std::path::Path;

/// Default predictions file name
pub const PREDICTIONS_PATH: &str = "predictions.tsv";

/// Scores one normalized (channels, size, size) image
pub trait Classifier {
    /// Returns the cancer confidence for the image
    fn predict(&self, image: ArrayView3<'_, f32>) -> Result<f32>;
}

/// Confidence for one crosswalk image
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Prediction {
    pub subject_id: String,
    /// Laterality as written in the crosswalk, or the DICOM header's when blank
    pub laterality: String,
    pub confidence: f32,
}

/// Scores every crosswalk image in order
///
/// # Errors
///
/// Stops at the first image that cannot be read, normalized or scored.
pub fn score_crosswalk<C: Classifier + ?Sized>(
    entries: &[CrosswalkEntry],
    image_dir: &Path,
    preprocessor: &ImagePreprocessor,
    classifier: &C,
    progress: &ProgressBar,
) -> Result<Vec<Prediction>> {
    let mut predictions = Vec::with_capacity(entries.len());
    for entry in entries {
        let file = image_dir.join(&entry.filename);
        let image = preprocessor.preprocess_file(&file, entry.laterality())?;
        let confidence = classifier.predict(image.pixels.view())?;
        debug!("{}: {}", entry.filename, confidence);

        let laterality = if entry.laterality_code.is_empty() {
            image.laterality.code().to_string()
        } else {
            entry.laterality_code.clone()
        };
        predictions.push(Prediction {
            subject_id: entry.subject_id.clone(),
            laterality,
            confidence,
        });
        progress.inc(1);
    }
    Ok(predictions)
}

/// Writes predictions as `subjectId  laterality  confidence` TSV
pub fn write_predictions(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["subjectId", "laterality", "confidence"])?;
    for p in predictions {
        writer.write_record([
            p.subject_id.as_str(),
            p.laterality.as_str(),
            p.confidence.to_string().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
