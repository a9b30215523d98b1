//! Image and clinical metadata normalization
//!
//! Shared by the dataset builder and the scoring driver.

pub mod metadata;
pub mod transform;

pub use metadata::{
    normalize, parse_float, parse_int, ExamMetadata, FieldNormalizer, METADATA_FIELDS,
    METADATA_FIELD_COUNT,
};
pub use transform::{
    center_crop_resize_filter, center_square, crop_nonzero, floor_below, mirror,
    normalize_intensity, replicate_channels, resize,
};
