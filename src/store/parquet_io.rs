// src/store/parquet_io.rs

use anyhow::{Context, Result};
use arrow::{compute::concat_batches, record_batch::RecordBatch};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
};

/// Read a whole Parquet file back into one batch, keeping column types.
pub fn read_parquet(file: File) -> Result<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("opening Parquet reader")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building Parquet reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("reading Parquet batches")?;
    concat_batches(&schema, &batches).context("concatenating Parquet batches")
}

/// Write `batch` as a single Snappy-compressed row group.
pub fn write_parquet(file: File, batch: &RecordBatch) -> Result<File> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(batch).context("writing batch")?;
    let mut buf = writer.into_inner().context("closing Arrow writer")?;
    buf.flush().context("flushing Parquet file")?;
    buf.into_inner()
        .map_err(|e| e.into_error())
        .context("unwrapping buffered writer")
}
