use super::Classifier;
use crate::error::{MammoprepError, Result};
use crate::types::PreprocessConfig;
use log::info;
use ndarray::ArrayView3;
use std::path::Path;
use tract_onnx::prelude::*;

/// Classifier backed by an ONNX model
///
/// The model takes a `[1, channels, size, size]` f32 tensor and its first
/// output value is the cancer confidence.
pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    shape: (usize, usize, usize),
}

fn tract_error(context: &str, err: TractError) -> MammoprepError {
    MammoprepError::InferenceError(format!("{}: {:#}", context, err))
}

impl OnnxClassifier {
    /// Loads and optimizes the model for the configured input shape
    pub fn load(path: &Path, config: &PreprocessConfig) -> Result<Self> {
        let shape = config.shape();
        let (c, h, w) = shape;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, c, h, w]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| tract_error(&path.display().to_string(), e))?;
        info!("Loaded model {} for input [1, {}, {}, {}]", path.display(), c, h, w);

        Ok(Self { plan, shape })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, image: ArrayView3<'_, f32>) -> Result<f32> {
        if image.dim() != self.shape {
            return Err(MammoprepError::InferenceError(format!(
                "image shape {:?} does not match model input {:?}",
                image.dim(),
                self.shape
            )));
        }
        let (c, h, w) = self.shape;
        let values = image.as_standard_layout();
        let values = values.as_slice().ok_or_else(|| {
            MammoprepError::InferenceError("input image is not contiguous".to_string())
        })?;

        let input = Tensor::from_shape(&[1, c, h, w], values)
            .map_err(|e| tract_error("building input tensor", e))?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| tract_error("running model", e))?;

        let output = outputs
            .first()
            .ok_or_else(|| MammoprepError::InferenceError("model has no outputs".to_string()))?;
        let output = output
            .cast_to::<f32>()
            .map_err(|e| tract_error("reading model output", e))?;
        let scores = output
            .as_slice::<f32>()
            .map_err(|e| tract_error("reading model output", e))?;
        scores
            .first()
            .copied()
            .ok_or_else(|| MammoprepError::InferenceError("model output is empty".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::path::PathBuf;

    /// ReduceMean over every axis of a `[1, 3, 4, 4]` input, keepdims = 0
    fn mean_model() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/mean.onnx")
    }

    fn small_config() -> PreprocessConfig {
        PreprocessConfig::default().with_size(4)
    }

    #[test]
    fn test_predict_returns_first_output() {
        let classifier = OnnxClassifier::load(&mean_model(), &small_config()).unwrap();
        let image = Array3::from_shape_fn((3, 4, 4), |(c, r, col)| (c * 16 + r * 4 + col) as f32);

        let confidence = classifier.predict(image.view()).unwrap();
        assert!((confidence - 23.5).abs() < 1e-4, "got {}", confidence);
    }

    #[test]
    fn test_predict_accepts_non_standard_layout() {
        let classifier = OnnxClassifier::load(&mean_model(), &small_config()).unwrap();
        let image = Array3::from_shape_fn((4, 4, 3), |(r, col, c)| (c * 16 + r * 4 + col) as f32);
        let transposed = image.view().permuted_axes([2, 0, 1]);

        let confidence = classifier.predict(transposed).unwrap();
        assert!((confidence - 23.5).abs() < 1e-4, "got {}", confidence);
    }

    #[test]
    fn test_predict_rejects_wrong_shape() {
        let classifier = OnnxClassifier::load(&mean_model(), &small_config()).unwrap();
        let image = Array3::<f32>::zeros((3, 8, 8));

        let result = classifier.predict(image.view());
        assert!(matches!(result, Err(MammoprepError::InferenceError(_))));
    }

    #[test]
    fn test_load_missing_model() {
        let result = OnnxClassifier::load(
            Path::new("/nonexistent/model.onnx"),
            &PreprocessConfig::default(),
        );
        assert!(matches!(result, Err(MammoprepError::InferenceError(_))));
    }

    #[test]
    fn test_load_invalid_model() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("model.onnx");
        std::fs::write(&path, b"not a protobuf model").unwrap();

        let result = OnnxClassifier::load(&path, &PreprocessConfig::default());
        assert!(result.is_err());
    }
}
