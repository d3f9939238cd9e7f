use arrow::record_batch::RecordBatch;
use std::path::Path;
use tracing::{info, instrument};

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::StageResult;
use crate::pipeline::{Stage, StageReport};
use crate::process::{stats::describe, utils::render_head};
use crate::store::{csv::read_csv_file, Layer, LayerStore};

/// Copy the raw CSV at `raw_path` into the ingested layer unchanged.
///
/// Nothing is written when the raw file cannot be read.
#[instrument(level = "info", skip(store, sink), fields(raw = %raw_path.display()))]
pub fn ingest(
    raw_path: &Path,
    store: &dyn LayerStore,
    sink: &dyn DiagnosticsSink,
    sample_rows: usize,
) -> StageResult<StageReport> {
    info!("reading raw input");
    let raw = read_csv_file(raw_path)?;
    ingest_batch(&raw, store, sink, sample_rows)
}

/// Write an already-loaded raw batch as the ingested layer, reporting its
/// size, a sample and descriptive statistics on the way.
pub fn ingest_batch(
    raw: &RecordBatch,
    store: &dyn LayerStore,
    sink: &dyn DiagnosticsSink,
    sample_rows: usize,
) -> StageResult<StageReport> {
    let rows = raw.num_rows();
    sink.record(Diagnostic::RowCount {
        stage: Stage::Ingest,
        rows,
    });
    sink.record(Diagnostic::Sample {
        stage: Stage::Ingest,
        label: "raw sample".into(),
        table: render_head(raw, sample_rows)?,
    });
    sink.record(Diagnostic::Statistics {
        stage: Stage::Ingest,
        columns: describe(raw),
    });

    store.write(Layer::Ingested, raw)?;
    sink.record(Diagnostic::Written {
        stage: Stage::Ingest,
        layer: Layer::Ingested,
        rows,
        bytes: store.size_bytes(Layer::Ingested),
    });

    Ok(StageReport {
        stage: Stage::Ingest,
        rows_in: rows,
        rows_out: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::error::StageError;
    use crate::store::{FsLayerStore, LayerFormat, MemoryLayerStore};
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    const RAW: &str = "name,email,date_of_birth,subscription_status,score\n\
ann,ann@example.com,2000-06-15,active,10\n\
bob,bobexample.com,1990-01-01,inactive,\n\
,carol@example.com,1985-03-03,active,30\n";

    #[test]
    fn copies_raw_file_byte_for_byte_and_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let raw_path = dir.path().join("raw.csv");
        fs::write(&raw_path, RAW)?;
        let store = FsLayerStore::new(dir.path().join("layers"), LayerFormat::Csv)?;
        let sink = CollectingSink::new();

        let report = ingest(&raw_path, &store, &sink, 3)?;
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.rows_out, 3);
        let first = fs::read(store.path_for(Layer::Ingested))?;
        assert_eq!(first, RAW.as_bytes());

        ingest(&raw_path, &store, &sink, 3)?;
        let second = fs::read(store.path_for(Layer::Ingested))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn reports_statistics_for_numeric_columns_only() -> Result<()> {
        let dir = tempdir()?;
        let raw_path = dir.path().join("raw.csv");
        fs::write(&raw_path, RAW)?;
        let store = MemoryLayerStore::new();
        let sink = CollectingSink::new();

        ingest(&raw_path, &store, &sink, 2)?;

        let stats = sink
            .events()
            .into_iter()
            .find_map(|e| match e {
                Diagnostic::Statistics { columns, .. } => Some(columns),
                _ => None,
            })
            .expect("statistics emitted");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].column, "score");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].mean, 20.0);

        assert!(sink.events().iter().any(|e| matches!(
            e,
            Diagnostic::Written { layer: Layer::Ingested, rows: 3, bytes: Some(_), .. }
        )));
        Ok(())
    }

    #[test]
    fn missing_raw_file_writes_nothing() {
        let store = MemoryLayerStore::new();
        let sink = CollectingSink::new();
        let err = ingest(Path::new("/no/such/raw.csv"), &store, &sink, 3).unwrap_err();
        assert!(matches!(err, StageError::SourceUnavailable { .. }));
        assert!(!store.exists(Layer::Ingested));
    }
}
