use crate::types::Laterality;
use csv::StringRecord;

/// Number of normalized clinical features per exam
pub const METADATA_FIELD_COUNT: usize = 15;

/// How one exam metadata column is parsed and scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldNormalizer {
    /// Column name in the exams metadata header
    pub name: &'static str,
    /// Zero-based column index in the exams metadata file
    pub column: usize,
    /// Value substituted for missing or unparsable cells
    pub default: f64,
    /// Values above this are capped before scaling
    pub cap_max: f64,
}

impl FieldNormalizer {
    const fn new(name: &'static str, column: usize, default: f64, cap_max: f64) -> Self {
        Self {
            name,
            column,
            default,
            cap_max,
        }
    }

    /// Parses and scales this field from a metadata row
    pub fn normalize_row(&self, row: &StringRecord, expected_max: f64) -> f32 {
        let value = row
            .get(self.column)
            .map(|cell| parse_float(cell, self.default))
            .unwrap_or(self.default);
        normalize(value, self.cap_max, expected_max) as f32
    }
}

/// Feature table, ordered by field name (codepoint order, as stored in the dataset)
pub const METADATA_FIELDS: [FieldNormalizer; METADATA_FIELD_COUNT] = [
    FieldNormalizer::new("age", 7, 0.0, 100.0),
    FieldNormalizer::new("antiestrogen", 16, 2.0, 2.0),
    FieldNormalizer::new("bcHistory", 10, 0.0, 1.0),
    FieldNormalizer::new("bmi", 19, 0.0, 90.0),
    FieldNormalizer::new("daysSincePreviousExam", 2, 0.0, 1000.0),
    FieldNormalizer::new("firstDegreeWithBc", 17, 2.0, 2.0),
    FieldNormalizer::new("firstDegreeWithBc50", 18, 2.0, 2.0),
    FieldNormalizer::new("hrt", 15, 2.0, 2.0),
    FieldNormalizer::new("implantEver", 8, 2.0, 2.0),
    FieldNormalizer::new("implantNow", 9, 6.0, 6.0),
    FieldNormalizer::new("previousBcLaterality", 12, 0.0, 5.0),
    FieldNormalizer::new("race", 20, 9.0, 9.0),
    FieldNormalizer::new("reduxHistory", 13, 2.0, 2.0),
    FieldNormalizer::new("reduxLaterality", 14, 5.0, 5.0),
    FieldNormalizer::new("yearsSincePreviousBc", 11, 0.0, 20.0),
];

const CANCER_LEFT_COLUMN: usize = 3;
const CANCER_RIGHT_COLUMN: usize = 4;
const INVASIVE_LEFT_COLUMN: usize = 5;
const INVASIVE_RIGHT_COLUMN: usize = 6;

/// Parses a float cell, falling back to `default`
pub fn parse_float(s: &str, default: f64) -> f64 {
    s.trim().parse().unwrap_or(default)
}

/// Parses an integer cell, falling back to `default`
///
/// `"1.0"` is not an integer and yields the default.
pub fn parse_int(s: &str, default: i64) -> i64 {
    s.trim().parse().unwrap_or(default)
}

/// Caps `value` at `cap_max` and maps `[0, cap_max]` onto `[-expected_max, expected_max]`
///
/// Only the upper bound is capped.
pub fn normalize(value: f64, cap_max: f64, expected_max: f64) -> f64 {
    let median = cap_max / 2.0;
    let value = value.min(cap_max);
    (value - median) / median * expected_max
}

/// One normalized row of the exams metadata file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ExamMetadata {
    pub subject_id: String,
    pub exam_index: String,
    pub cancer_left: i64,
    pub cancer_right: i64,
    pub invasive_left: i64,
    pub invasive_right: i64,
    /// Normalized features in [`METADATA_FIELDS`] order
    pub features: [f32; METADATA_FIELD_COUNT],
}

impl ExamMetadata {
    /// Builds the exam record from a metadata row
    pub fn from_row(row: &StringRecord, expected_max: f64) -> Self {
        let int_at = |column: usize| row.get(column).map(|s| parse_int(s, 0)).unwrap_or(0);

        let mut features = [0.0_f32; METADATA_FIELD_COUNT];
        for (slot, field) in features.iter_mut().zip(METADATA_FIELDS.iter()) {
            *slot = field.normalize_row(row, expected_max);
        }

        Self {
            subject_id: row.get(0).unwrap_or_default().to_string(),
            exam_index: row.get(1).unwrap_or_default().to_string(),
            cancer_left: int_at(CANCER_LEFT_COLUMN),
            cancer_right: int_at(CANCER_RIGHT_COLUMN),
            invasive_left: int_at(INVASIVE_LEFT_COLUMN),
            invasive_right: int_at(INVASIVE_RIGHT_COLUMN),
            features,
        }
    }

    /// Lookup key shared with the images crosswalk
    pub fn key(&self) -> String {
        exam_key(&self.subject_id, &self.exam_index)
    }

    /// Cancer flag for one breast, `None` for unknown laterality
    pub fn label(&self, laterality: Laterality) -> Option<i64> {
        match laterality {
            Laterality::Left => Some(self.cancer_left),
            Laterality::Right => Some(self.cancer_right),
            Laterality::Unknown => None,
        }
    }
}

/// Joins subject and exam ids into the metadata lookup key
pub fn exam_key(subject_id: &str, exam_index: &str) -> String {
    format!("{}_{}", subject_id, exam_index)
}

/// Names of the normalized features, in storage order
pub fn field_names() -> Vec<&'static str> {
    METADATA_FIELDS.iter().map(|f| f.name).collect()
}
