use thiserror::Error;

/// Result type for mammoprep operations
pub type Result<T> = std::result::Result<T, MammoprepError>;

/// Error types for mammoprep operations
#[derive(Error, Debug)]
pub enum MammoprepError {
    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// Pixel data could not be decoded
    #[error("Pixel data error: {0}")]
    PixelDataError(String),

    /// Image has no non-zero pixels to crop around
    #[error("Image contains no non-zero pixels")]
    EmptyImage,

    /// Invalid tag or cell value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Crosswalk references an exam missing from the metadata file
    #[error("No exam metadata for key {0}")]
    MissingMetadata(String),

    /// Malformed or inconsistent input data
    #[error("Data error: {0}")]
    DataError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Model loading or execution error
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Tab-separated input/output error
    #[error("TSV error: {0}")]
    TsvError(#[from] csv::Error),

    /// Arrow array construction error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet storage error
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<String> for MammoprepError {
    fn from(s: String) -> Self {
        MammoprepError::DataError(s)
    }
}

impl From<&str> for MammoprepError {
    fn from(s: &str) -> Self {
        MammoprepError::DataError(s.to_string())
    }
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for MammoprepError {
    fn from(e: dicom_object::ReadError) -> Self {
        MammoprepError::DicomError(format!("{}", e))
    }
}

impl From<dicom_pixeldata::Error> for MammoprepError {
    fn from(e: dicom_pixeldata::Error) -> Self {
        MammoprepError::PixelDataError(format!("{}", e))
    }
}

impl From<ndarray::ShapeError> for MammoprepError {
    fn from(e: ndarray::ShapeError) -> Self {
        MammoprepError::PixelDataError(format!("{}", e))
    }
}
