use crate::error::{MammoprepError, Result};
use crate::extraction::{extract_laterality, read_pixel_array};
use crate::preprocess::{center_crop_resize_filter, replicate_channels};
use crate::types::{Laterality, PreprocessConfig};
use dicom_object::{open_file, DefaultDicomObject};
use ndarray::Array3;
use std::path::Path;

/// Turns mammography DICOM files into normalized model inputs
///
/// # Example
///
/// ```
/// use mammoprep_core::{ImagePreprocessor, Laterality, PreprocessConfig};
/// use ndarray::Array2;
///
/// let preprocessor = ImagePreprocessor::new(PreprocessConfig::default().with_size(32));
///
/// // A bright square of tissue in an otherwise empty detector
/// let mut pixels = Array2::<f32>::zeros((100, 80));
/// pixels.slice_mut(ndarray::s![10..90, 10..70]).fill(3000.0);
///
/// let image = preprocessor.preprocess_pixels(&pixels, Laterality::Left).unwrap();
/// assert_eq!(image.dim(), (3, 32, 32));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Creates a preprocessor for the given transform parameters
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Returns the transform parameters
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Normalizes a DICOM file into a (channels, size, size) array
    ///
    /// `laterality` normally comes from the crosswalk. When it is
    /// `Unknown`, the DICOM header is consulted instead.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or its pixel data decoded
    /// - The image is entirely zero
    /// - No laterality can be determined
    pub fn preprocess_file(&self, path: &Path, laterality: Laterality) -> Result<NormalizedImage> {
        let dcm = open_file(path)?;
        self.preprocess_dicom(&dcm, laterality).map_err(|e| match e {
            MammoprepError::InvalidValue(msg) => {
                MammoprepError::InvalidValue(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Normalizes an already-opened DICOM object
    pub fn preprocess_dicom(
        &self,
        dcm: &DefaultDicomObject,
        laterality: Laterality,
    ) -> Result<NormalizedImage> {
        let laterality = resolve_laterality(laterality, dcm).ok_or_else(|| {
            MammoprepError::InvalidValue("no laterality in crosswalk or DICOM header".to_string())
        })?;
        let pixels = read_pixel_array(dcm)?;

        Ok(NormalizedImage {
            laterality,
            pixels: self.preprocess_pixels(&pixels, laterality)?,
        })
    }

    /// Normalizes a raw `rows x columns` pixel array
    pub fn preprocess_pixels(
        &self,
        pixels: &ndarray::Array2<f32>,
        laterality: Laterality,
    ) -> Result<Array3<f32>> {
        let normalized = center_crop_resize_filter(pixels.view(), laterality, &self.config)?;
        Ok(replicate_channels(&normalized, self.config.channels))
    }
}

/// Crosswalk laterality when known, else the DICOM header's
fn resolve_laterality(given: Laterality, dcm: &DefaultDicomObject) -> Option<Laterality> {
    let laterality = if given.is_unknown() {
        extract_laterality(dcm)
    } else {
        given
    };
    (!laterality.is_unknown()).then_some(laterality)
}

/// A normalized model input
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    /// Laterality the image was normalized for
    pub laterality: Laterality,

    /// (channels, size, size) values in the normalized range
    pub pixels: Array3<f32>,
}
