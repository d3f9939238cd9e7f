// src/store/fs.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use glob::glob;
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use super::{csv, parquet_io, Layer, LayerFormat, LayerStore};
use crate::error::{StageError, StageResult};

/// Directory of `<layer>.<ext>` files, one per layer.
///
/// Writes land in `<layer>.<ext>.tmp` and are renamed over the final path once
/// complete, so a reader sees either the previous layer or the new one.
#[derive(Debug, Clone)]
pub struct FsLayerStore {
    dir: PathBuf,
    format: LayerFormat,
}

impl FsLayerStore {
    /// Open (creating if needed) a store rooted at `dir`. Temp files left
    /// behind by an aborted write are removed.
    pub fn new(dir: impl Into<PathBuf>, format: LayerFormat) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating layer directory {}", dir.display()))?;

        let pattern = format!("{}/*.tmp", dir.display());
        for entry in glob(&pattern).context("invalid glob pattern for layer directory")? {
            match entry {
                Ok(path) => {
                    warn!(path = %path.display(), "removing stale temp file");
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(path = %path.display(), "could not remove temp file: {}", e);
                    }
                }
                Err(e) => warn!("cannot read glob entry: {:?}", e),
            }
        }

        Ok(Self { dir, format })
    }

    pub fn format(&self) -> LayerFormat {
        self.format
    }

    pub fn path_for(&self, layer: Layer) -> PathBuf {
        self.dir
            .join(format!("{}.{}", layer.as_str(), self.format.extension()))
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let file = match self.format {
            LayerFormat::Csv => {
                let mut buf = csv::write_csv(std::io::BufWriter::new(file), batch)
                    .context("writing CSV")?;
                buf.flush().context("flushing CSV")?;
                buf.into_inner().map_err(|e| e.into_error())?
            }
            LayerFormat::Parquet => parquet_io::write_parquet(file, batch)?,
        };
        file.sync_all()
            .with_context(|| format!("syncing {}", path.display()))?;
        Ok(())
    }
}

impl LayerStore for FsLayerStore {
    fn read(&self, layer: Layer) -> StageResult<RecordBatch> {
        let path = self.path_for(layer);
        let what = format!("layer `{}` at {}", layer, path.display());
        let file =
            File::open(&path).map_err(|e| StageError::source_unavailable(what.clone(), e))?;

        let batch = match self.format {
            LayerFormat::Csv => {
                csv::read_csv(file).map_err(|e| StageError::source_unavailable(what, e))?
            }
            LayerFormat::Parquet => parquet_io::read_parquet(file)
                .map_err(|e| StageError::source_unavailable(what, e))?,
        };
        debug!(layer = %layer, rows = batch.num_rows(), "read layer");
        Ok(batch)
    }

    fn write(&self, layer: Layer, batch: &RecordBatch) -> StageResult<()> {
        let final_path = self.path_for(layer);
        let tmp_path = final_path.with_extension(format!("{}.tmp", self.format.extension()));

        if let Err(e) = self.write_file(&tmp_path, batch) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StageError::write_failed(layer, e));
        }

        fs::rename(&tmp_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StageError::write_failed(
                layer,
                anyhow::Error::new(e).context(format!(
                    "renaming {} -> {}",
                    tmp_path.display(),
                    final_path.display()
                )),
            )
        })?;
        debug!(layer = %layer, rows = batch.num_rows(), path = %final_path.display(), "wrote layer");
        Ok(())
    }

    fn exists(&self, layer: Layer) -> bool {
        self.path_for(layer).is_file()
    }

    fn size_bytes(&self, layer: Layer) -> Option<u64> {
        fs::metadata(self.path_for(layer)).ok().map(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Date32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sample() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("date_of_birth", DataType::Date32, true),
            Field::new("age", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("ann"), None])) as ArrayRef,
                Arc::new(Date32Array::from(vec![Some(11_123), Some(0)])),
                Arc::new(Int64Array::from(vec![Some(24), Some(54)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn csv_layer_writes_dates_as_iso_text() -> Result<()> {
        let dir = tempdir()?;
        let store = FsLayerStore::new(dir.path(), LayerFormat::Csv)?;
        store.write(Layer::Cleaned, &sample())?;

        let text = fs::read_to_string(store.path_for(Layer::Cleaned))?;
        assert_eq!(text, "name,date_of_birth,age\nann,2000-06-15,24\n,1970-01-01,54\n");

        let back = store.read(Layer::Cleaned)?;
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.schema().field(2).data_type(), &DataType::Utf8);
        assert!(store.size_bytes(Layer::Cleaned).unwrap() > 0);
        Ok(())
    }

    #[test]
    fn parquet_layer_keeps_types() -> Result<()> {
        let dir = tempdir()?;
        let store = FsLayerStore::new(dir.path(), LayerFormat::Parquet)?;
        let batch = sample();
        store.write(Layer::Cleaned, &batch)?;
        let back = store.read(Layer::Cleaned)?;
        assert_eq!(back.schema().fields(), batch.schema().fields());
        assert_eq!(back.columns(), batch.columns());
        Ok(())
    }

    #[test]
    fn rewrite_replaces_and_leaves_no_temp_files() -> Result<()> {
        let dir = tempdir()?;
        let store = FsLayerStore::new(dir.path(), LayerFormat::Csv)?;
        let batch = sample();
        store.write(Layer::Ingested, &batch)?;
        store.write(Layer::Ingested, &batch.slice(0, 1))?;

        assert_eq!(store.read(Layer::Ingested)?.num_rows(), 1);
        let leftovers: Vec<_> = fs::read_dir(dir.path())?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn stale_temp_files_are_swept_on_open() -> Result<()> {
        let dir = tempdir()?;
        let stale = dir.path().join("cleaned.csv.tmp");
        fs::write(&stale, "half a layer")?;
        let _store = FsLayerStore::new(dir.path(), LayerFormat::Csv)?;
        assert!(!stale.exists());
        Ok(())
    }

    #[test]
    fn missing_layer_is_source_unavailable() -> Result<()> {
        let dir = tempdir()?;
        let store = FsLayerStore::new(dir.path(), LayerFormat::Csv)?;
        assert!(!store.exists(Layer::Aggregated));
        let err = store.read(Layer::Aggregated).unwrap_err();
        assert!(matches!(err, StageError::SourceUnavailable { .. }));
        Ok(())
    }
}
