//! Training dataset construction
//!
//! Reads the images crosswalk and exams metadata, normalizes every listed
//! image on a fixed pool of workers (one chunk file each), then concatenates
//! the chunks into a single Parquet file in crosswalk order.

mod builder;
mod storage;
mod tsv;

pub use builder::{assemble_samples, chunk_size, BuildConfig, DatasetBuilder, Sample};
pub use storage::{
    dataset_schema, merge_chunks, read_summary, DatasetSummary, DatasetWriter, LabelStats,
    EXAM_INDEX_COLUMN, FILENAME_COLUMN, IMAGE_COLUMN, LABEL_COLUMN, LATERALITY_COLUMN, META_COLUMN,
    SUBJECT_ID_COLUMN,
};
pub use tsv::{read_crosswalk, read_metadata, CrosswalkEntry};
