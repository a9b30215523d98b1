use dicom_core::Tag;
use dicom_object::InMemDicomObject;

// Pixel Description Tags
pub use dicom_dictionary_std::tags::{BITS_STORED, PHOTOMETRIC_INTERPRETATION};

// Laterality Tags
pub use dicom_dictionary_std::tags::{
    FRAME_ANATOMY_SEQUENCE, FRAME_LATERALITY, IMAGE_LATERALITY, LATERALITY,
    SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
};

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Helper to get u16 value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to u16
pub fn get_u16_value(dcm: &InMemDicomObject, tag: Tag) -> Option<u16> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<u16>().ok())
}
