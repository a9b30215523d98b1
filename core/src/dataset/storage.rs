use crate::error::{MammoprepError, Result};
use crate::preprocess::metadata::{field_names, METADATA_FIELD_COUNT};
use crate::types::PreprocessConfig;
use arrow::array::{
    Array, ArrayRef, AsArray, FixedSizeListArray, Float32Array, StringBuilder, UInt8Array,
};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef, UInt8Type};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::builder::Sample;

pub const SUBJECT_ID_COLUMN: &str = "subject_id";
pub const EXAM_INDEX_COLUMN: &str = "exam_index";
pub const LATERALITY_COLUMN: &str = "laterality";
pub const FILENAME_COLUMN: &str = "filename";
pub const LABEL_COLUMN: &str = "label";
pub const META_COLUMN: &str = "meta";
pub const IMAGE_COLUMN: &str = "image";

// File-level key/value metadata
const KEY_IMAGE_SHAPE: &str = "image_shape";
const KEY_META_FIELDS: &str = "meta_fields";
const KEY_POSITIVE: &str = "positive";
const KEY_NEGATIVE: &str = "negative";
const KEY_POSITIVE_RATIO: &str = "positive_ratio";
const KEY_EXPECTED_MIN: &str = "expected_min";
const KEY_EXPECTED_MAX: &str = "expected_max";
const KEY_FILTER_THRESHOLD: &str = "filter_threshold";

fn list_item() -> FieldRef {
    Arc::new(Field::new("item", DataType::Float32, false))
}

/// Column layout shared by worker chunks and the merged dataset
pub fn dataset_schema(config: &PreprocessConfig) -> Schema {
    Schema::new(vec![
        Field::new(SUBJECT_ID_COLUMN, DataType::Utf8, false),
        Field::new(EXAM_INDEX_COLUMN, DataType::Utf8, false),
        Field::new(LATERALITY_COLUMN, DataType::Utf8, false),
        Field::new(FILENAME_COLUMN, DataType::Utf8, false),
        Field::new(LABEL_COLUMN, DataType::UInt8, false),
        Field::new(
            META_COLUMN,
            DataType::FixedSizeList(list_item(), METADATA_FIELD_COUNT as i32),
            false,
        ),
        Field::new(
            IMAGE_COLUMN,
            DataType::FixedSizeList(list_item(), config.image_len() as i32),
            false,
        ),
    ])
}

/// Positive/negative label counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct LabelStats {
    pub positive: usize,
    pub negative: usize,
}

impl LabelStats {
    /// Counts a label; anything other than 1 is negative
    pub fn record(&mut self, label: u8) {
        if label == 1 {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
    }

    /// positive / negative
    ///
    /// # Errors
    ///
    /// Returns an error when there are no negative samples.
    pub fn positive_ratio(&self) -> Result<f32> {
        if self.negative == 0 {
            return Err(MammoprepError::DataError(
                "cannot compute positive ratio without negative samples".to_string(),
            ));
        }
        Ok(self.positive as f32 / self.negative as f32)
    }
}

/// Shape and label statistics of a built dataset
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub rows: usize,
    /// (channels, height, width)
    pub image_shape: (usize, usize, usize),
    pub meta_fields: Vec<String>,
    pub stats: LabelStats,
    pub positive_ratio: f32,
}

/// File-level metadata recorded in the merged dataset
pub fn dataset_metadata(
    config: &PreprocessConfig,
    stats: &LabelStats,
    ratio: f32,
) -> HashMap<String, String> {
    let (c, h, w) = config.shape();
    HashMap::from([
        (KEY_IMAGE_SHAPE.to_string(), format!("{},{},{}", c, h, w)),
        (KEY_META_FIELDS.to_string(), field_names().join(",")),
        (KEY_POSITIVE.to_string(), stats.positive.to_string()),
        (KEY_NEGATIVE.to_string(), stats.negative.to_string()),
        (KEY_POSITIVE_RATIO.to_string(), ratio.to_string()),
        (
            KEY_EXPECTED_MIN.to_string(),
            config.expected_min().to_string(),
        ),
        (
            KEY_EXPECTED_MAX.to_string(),
            config.expected_max.to_string(),
        ),
        (
            KEY_FILTER_THRESHOLD.to_string(),
            config.filter_threshold.to_string(),
        ),
    ])
}

fn writer_properties(row_group_size: usize) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_dictionary_enabled(false)
        .set_max_row_group_size(row_group_size.max(1))
        .build()
}

/// Accumulates samples and their normalized images into record batches
pub struct BatchBuilder {
    schema: SchemaRef,
    image_len: usize,
    subject_ids: StringBuilder,
    exam_indices: StringBuilder,
    lateralities: StringBuilder,
    filenames: StringBuilder,
    labels: Vec<u8>,
    meta: Vec<f32>,
    images: Vec<f32>,
}

impl BatchBuilder {
    pub fn new(schema: SchemaRef, image_len: usize) -> Self {
        Self {
            schema,
            image_len,
            subject_ids: StringBuilder::new(),
            exam_indices: StringBuilder::new(),
            lateralities: StringBuilder::new(),
            filenames: StringBuilder::new(),
            labels: Vec::new(),
            meta: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Appends one row
    ///
    /// `image` must hold exactly `channels * size * size` values in
    /// (channel, row, column) order.
    pub fn push(&mut self, sample: &Sample, image: &[f32]) -> Result<()> {
        if image.len() != self.image_len {
            return Err(MammoprepError::DataError(format!(
                "{}: image has {} values, expected {}",
                sample.filename,
                image.len(),
                self.image_len
            )));
        }
        self.subject_ids.append_value(&sample.subject_id);
        self.exam_indices.append_value(&sample.exam_index);
        self.lateralities.append_value(sample.laterality.code());
        self.filenames.append_value(&sample.filename);
        self.labels.push(sample.label);
        self.meta.extend_from_slice(&sample.meta);
        self.images.extend_from_slice(image);
        Ok(())
    }

    /// Builds a record batch from the buffered rows and resets the builder
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let meta = fixed_size_list(std::mem::take(&mut self.meta), METADATA_FIELD_COUNT)?;
        let images = fixed_size_list(std::mem::take(&mut self.images), self.image_len)?;
        let labels = UInt8Array::from(std::mem::take(&mut self.labels));

        let columns: Vec<ArrayRef> = vec![
            Arc::new(self.subject_ids.finish()),
            Arc::new(self.exam_indices.finish()),
            Arc::new(self.lateralities.finish()),
            Arc::new(self.filenames.finish()),
            Arc::new(labels),
            Arc::new(meta),
            Arc::new(images),
        ];
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}

fn fixed_size_list(values: Vec<f32>, width: usize) -> Result<FixedSizeListArray> {
    Ok(FixedSizeListArray::try_new(
        list_item(),
        width as i32,
        Arc::new(Float32Array::from(values)),
        None,
    )?)
}

/// Streams rows into one Parquet file, flushing every `batch_size` rows
pub struct DatasetWriter {
    writer: ArrowWriter<File>,
    batch: BatchBuilder,
    batch_size: usize,
    rows: usize,
}

impl DatasetWriter {
    /// Creates (truncating) the file at `path`
    pub fn create(
        path: &Path,
        schema: SchemaRef,
        image_len: usize,
        batch_size: usize,
        row_group_size: usize,
    ) -> Result<Self> {
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(
            file,
            schema.clone(),
            Some(writer_properties(row_group_size)),
        )?;
        Ok(Self {
            writer,
            batch: BatchBuilder::new(schema, image_len),
            batch_size: batch_size.max(1),
            rows: 0,
        })
    }

    pub fn append(&mut self, sample: &Sample, image: &[f32]) -> Result<()> {
        self.batch.push(sample, image)?;
        self.rows += 1;
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.batch.is_empty() {
            let batch = self.batch.finish()?;
            self.writer.write(&batch)?;
        }
        Ok(())
    }

    /// Flushes buffered rows and writes the file footer
    pub fn close(mut self) -> Result<usize> {
        self.flush()?;
        self.writer.close()?;
        Ok(self.rows)
    }
}

/// Concatenates chunk files into `output`, in the given order
///
/// Returns the number of rows written.
pub fn merge_chunks(
    chunks: &[PathBuf],
    output: &Path,
    metadata: HashMap<String, String>,
    row_group_size: usize,
) -> Result<usize> {
    let first = chunks
        .first()
        .ok_or_else(|| MammoprepError::DataError("no chunk files to merge".to_string()))?;
    let chunk_schema = ParquetRecordBatchReaderBuilder::try_new(File::open(first)?)?
        .schema()
        .clone();
    let schema = Arc::new(Schema::new_with_metadata(
        chunk_schema.fields().clone(),
        metadata,
    ));

    let mut writer = ArrowWriter::try_new(
        File::create(output)?,
        schema,
        Some(writer_properties(row_group_size)),
    )?;
    let mut rows = 0;
    for chunk in chunks {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(chunk)?)?.build()?;
        for batch in reader {
            let batch = batch?;
            rows += batch.num_rows();
            writer.write(&batch)?;
        }
        debug!("Merged {} ({} rows so far)", chunk.display(), rows);
    }
    writer.close()?;

    Ok(rows)
}

/// Recomputes the summary of a built dataset
///
/// Row count comes from the Parquet footer; label counts are read from the
/// label column.
pub fn read_summary(path: &Path) -> Result<DatasetSummary> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();
    let rows = builder.metadata().file_metadata().num_rows() as usize;

    let image_shape = schema
        .metadata()
        .get(KEY_IMAGE_SHAPE)
        .and_then(|s| parse_shape(s))
        .ok_or_else(|| {
            MammoprepError::DataError(format!("{}: missing image shape", path.display()))
        })?;
    let meta_fields = schema
        .metadata()
        .get(KEY_META_FIELDS)
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let label_index = schema.index_of(LABEL_COLUMN)?;
    let mask = ProjectionMask::roots(builder.parquet_schema(), [label_index]);
    let mut stats = LabelStats::default();
    for batch in builder.with_projection(mask).build()? {
        let batch = batch?;
        let labels = batch.column(0).as_primitive::<UInt8Type>();
        for i in 0..labels.len() {
            stats.record(labels.value(i));
        }
    }

    Ok(DatasetSummary {
        path: path.to_path_buf(),
        rows,
        image_shape,
        meta_fields,
        positive_ratio: stats.positive_ratio()?,
        stats,
    })
}

fn parse_shape(s: &str) -> Option<(usize, usize, usize)> {
    let dims: Vec<usize> = s
        .split(',')
        .map(|d| d.trim().parse().ok())
        .collect::<Option<_>>()?;
    match dims[..] {
        [c, h, w] => Some((c, h, w)),
        _ => None,
    }
}
