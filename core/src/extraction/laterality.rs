use crate::types::Laterality;
use dicom_object::InMemDicomObject;

use super::tags::{
    get_string_value, FRAME_ANATOMY_SEQUENCE, FRAME_LATERALITY, IMAGE_LATERALITY,
    LATERALITY as LATERALITY_TAG, SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
};

/// Extracts laterality from the DICOM header
///
/// Used when the crosswalk leaves the laterality cell empty.
///
/// # Algorithm
///
/// 1. Try ImageLaterality tag first
/// 2. Fall back to Laterality tag
/// 3. Fall back to FrameLaterality in SharedFunctionalGroupsSequence
/// 4. Parse: "L"→Left, "R"→Right, else→Unknown
pub fn extract_laterality(dcm: &InMemDicomObject) -> Laterality {
    [
        get_string_value(dcm, IMAGE_LATERALITY),
        get_string_value(dcm, LATERALITY_TAG),
        extract_frame_laterality(dcm),
    ]
    .into_iter()
    .flatten()
    .find(|lat| !lat.is_empty())
    .map(|lat| Laterality::from_code(&lat))
    .unwrap_or(Laterality::Unknown)
}

/// Extracts FrameLaterality from SharedFunctionalGroupsSequence
///
/// Navigates: SharedFunctionalGroupsSequence[0] → FrameAnatomySequence[0] → FrameLaterality
fn extract_frame_laterality(dcm: &InMemDicomObject) -> Option<String> {
    dcm.element(SHARED_FUNCTIONAL_GROUPS_SEQUENCE)
        .ok()
        .and_then(|shared_seq| shared_seq.items())
        .and_then(|items| items.first())
        .and_then(|first_item| first_item.element(FRAME_ANATOMY_SEQUENCE).ok())
        .and_then(|frame_anatomy_seq| frame_anatomy_seq.items())
        .and_then(|items| items.first())
        .and_then(|first_item| get_string_value(first_item, FRAME_LATERALITY))
}
