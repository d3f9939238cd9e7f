// src/store/csv.rs

use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder, WriterBuilder},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs::File,
    io::{Read, Seek, Write},
    path::Path,
    sync::Arc,
};

use crate::error::{StageError, StageResult};

/// Cells treated as null when reading delimited text.
static NULL_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(|NA|N/A|NaN|nan|NULL|null|None|<NA>)$").expect("null marker pattern")
});

/// Read a headed CSV stream into a single batch, every column as nullable Utf8.
///
/// No types are inferred: the raw text is preserved so a copy written back
/// out carries the same values. Rows shorter than the header are padded
/// with nulls.
pub fn read_csv<R: Read + Seek>(mut reader: R) -> Result<RecordBatch, ArrowError> {
    let (header, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut reader, Some(0))?;
    reader.rewind()?;

    let fields: Vec<Field> = header
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let csv_reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_null_regex(NULL_MARKERS.clone())
        .with_truncated_rows(true)
        .build(reader)?;
    let batches = csv_reader.collect::<Result<Vec<_>, _>>()?;

    concat_batches(&schema, &batches)
}

/// Open and read a raw CSV file. Any failure is `SourceUnavailable`.
pub fn read_csv_file(path: &Path) -> StageResult<RecordBatch> {
    let what = path.display().to_string();
    let file = File::open(path).map_err(|e| StageError::source_unavailable(what.clone(), e))?;
    read_csv(file).map_err(|e| StageError::source_unavailable(what, e))
}

/// Write `batch` with a header row. Nulls become empty cells and dates use
/// `YYYY-MM-DD`. Returns the inner writer so callers can flush or sync it.
pub fn write_csv<W: Write>(writer: W, batch: &RecordBatch) -> Result<W, ArrowError> {
    let mut csv_writer = WriterBuilder::new().with_header(true).build(writer);
    csv_writer.write(batch)?;
    Ok(csv_writer.into_inner())
}
