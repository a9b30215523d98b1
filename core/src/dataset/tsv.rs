use crate::error::{MammoprepError, Result};
use crate::preprocess::metadata::{exam_key, ExamMetadata};
use crate::types::Laterality;
use csv::{ReaderBuilder, StringRecord};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

const CROSSWALK_MIN_COLUMNS: usize = 6;

/// One row of the images crosswalk
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct CrosswalkEntry {
    pub subject_id: String,
    pub exam_index: String,
    pub image_index: String,
    pub view: String,
    /// Laterality cell as written in the crosswalk
    pub laterality_code: String,
    pub filename: String,
}

impl CrosswalkEntry {
    fn from_row(row: &StringRecord) -> Result<Self> {
        if row.len() < CROSSWALK_MIN_COLUMNS {
            return Err(MammoprepError::DataError(format!(
                "crosswalk line {} has {} columns, expected at least {}",
                line_of(row),
                row.len(),
                CROSSWALK_MIN_COLUMNS
            )));
        }
        let cell = |i: usize| row.get(i).unwrap_or_default().trim().to_string();

        Ok(Self {
            subject_id: cell(0),
            exam_index: cell(1),
            image_index: cell(2),
            view: cell(3),
            laterality_code: cell(4),
            filename: cell(5),
        })
    }

    /// Parsed laterality; `Unknown` for blank or unrecognized cells
    pub fn laterality(&self) -> Laterality {
        Laterality::from_code(&self.laterality_code)
    }

    /// Key into the exams metadata table
    pub fn exam_key(&self) -> String {
        exam_key(&self.subject_id, &self.exam_index)
    }
}

fn line_of(row: &StringRecord) -> u64 {
    row.position().map(|p| p.line()).unwrap_or(0)
}

fn open_tsv(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| {
        MammoprepError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Reads the images crosswalk, preserving row order
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row has fewer than six
/// columns.
pub fn read_crosswalk(path: &Path) -> Result<Vec<CrosswalkEntry>> {
    let mut reader = open_tsv(path)?;
    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        entries.push(CrosswalkEntry::from_row(&row)?);
    }
    debug!("Read {} crosswalk rows from {}", entries.len(), path.display());
    Ok(entries)
}

/// Reads the exams metadata file keyed by `subjectId_examIndex`
///
/// Later rows with a duplicate key replace earlier ones.
pub fn read_metadata(path: &Path, expected_max: f64) -> Result<HashMap<String, ExamMetadata>> {
    let mut reader = open_tsv(path)?;
    let mut metadata = HashMap::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let exam = ExamMetadata::from_row(&row, expected_max);
        if let Some(previous) = metadata.insert(exam.key(), exam) {
            warn!(
                "Duplicate exam metadata for {} at line {}; keeping the later row",
                previous.key(),
                line_of(&row)
            );
        }
    }
    debug!("Read {} exams from {}", metadata.len(), path.display());
    Ok(metadata)
}
