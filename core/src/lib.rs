pub mod api;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod extraction;
pub mod inference;
pub mod preprocess;
pub mod types;

#[cfg(test)]
mod testing;

pub use api::{ImagePreprocessor, NormalizedImage};
pub use cli::report::TextReport;
pub use dataset::{BuildConfig, DatasetBuilder, DatasetSummary};
pub use error::{MammoprepError, Result};
pub use inference::{Classifier, OnnxClassifier, Prediction};
pub use types::*;
