use arrow::{
    array::{Array, ArrayRef, AsArray, BooleanArray, Date32Array, Int64Array, StringArray},
    compute::{and, filter_record_batch, is_not_null},
    datatypes::{DataType, Date32Type, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
    temporal_conversions::UNIX_EPOCH_DAY,
};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::diagnostics::{Diagnostic, DiagnosticsSink, DropReason};
use crate::error::StageResult;
use crate::pipeline::{Stage, StageReport};
use crate::process::{
    date_parser::{age_on, parse_date},
    stats::describe_column,
    utils::{append_column, as_strings, render_head, replace_column, required_column},
};
use crate::store::{Layer, LayerStore};

/// Columns a record must carry a value for to survive cleaning.
pub const REQUIRED_COLUMNS: [&str; 3] = ["name", "email", "date_of_birth"];
pub const AGE_COLUMN: &str = "age";

#[derive(Clone, Copy, Debug)]
pub struct CleanOptions {
    pub as_of: NaiveDate,
    pub sample_rows: usize,
}

/// Read the ingested layer, clean it, and write the cleaned layer.
#[instrument(level = "info", skip(store, sink), fields(as_of = %opts.as_of))]
pub fn clean(
    store: &dyn LayerStore,
    sink: &dyn DiagnosticsSink,
    opts: &CleanOptions,
) -> StageResult<StageReport> {
    let ingested = store.read(Layer::Ingested)?;
    sink.record(Diagnostic::RowCount {
        stage: Stage::Clean,
        rows: ingested.num_rows(),
    });
    sink.record(Diagnostic::Sample {
        stage: Stage::Clean,
        label: "ingested sample".into(),
        table: render_head(&ingested, opts.sample_rows)?,
    });

    let cleaned = clean_batch(&ingested, sink, opts)?;

    store.write(Layer::Cleaned, &cleaned)?;
    sink.record(Diagnostic::Written {
        stage: Stage::Clean,
        layer: Layer::Cleaned,
        rows: cleaned.num_rows(),
        bytes: store.size_bytes(Layer::Cleaned),
    });
    sink.record(Diagnostic::Sample {
        stage: Stage::Clean,
        label: "cleaned sample".into(),
        table: render_head(&cleaned, opts.sample_rows)?,
    });

    Ok(StageReport {
        stage: Stage::Clean,
        rows_in: ingested.num_rows(),
        rows_out: cleaned.num_rows(),
    })
}

/// The cleaning transform on its own. Steps run in order, each on the
/// survivors of the previous one:
///
/// 1. drop rows with a null `name`, `email` or `date_of_birth`
/// 2. repair `...example...` emails missing their `@`
/// 3. parse `date_of_birth`, dropping rows it cannot be read from
/// 4. derive `age` as of `opts.as_of`
pub fn clean_batch(
    batch: &RecordBatch,
    sink: &dyn DiagnosticsSink,
    opts: &CleanOptions,
) -> StageResult<RecordBatch> {
    // 1) nulls
    let complete = drop_incomplete(batch)?;
    sink.record(Diagnostic::Dropped {
        stage: Stage::Clean,
        reason: DropReason::NullField,
        rows: batch.num_rows() - complete.num_rows(),
    });

    // 2) emails
    let emails = as_strings(required_column(&complete, Layer::Ingested, "email")?)?;
    let (emails, repaired) = repair_emails(&emails);
    sink.record(Diagnostic::Repaired {
        stage: Stage::Clean,
        emails: repaired.len(),
    });
    if !repaired.is_empty() {
        sink.record(Diagnostic::Sample {
            stage: Stage::Clean,
            label: "repaired emails".into(),
            table: render_head(&single_column("email", repaired)?, opts.sample_rows)?,
        });
    }
    let complete = replace_column(&complete, "email", Arc::new(emails))?;

    // 3) dates
    let raw_dates = as_strings(required_column(&complete, Layer::Ingested, "date_of_birth")?)?;
    let dates = parse_dates(&raw_dates);
    let valid = is_not_null(&dates)?;
    let dated = replace_column(&complete, "date_of_birth", Arc::new(dates))?;
    let dated = filter_record_batch(&dated, &valid)?;
    sink.record(Diagnostic::Dropped {
        stage: Stage::Clean,
        reason: DropReason::InvalidDate,
        rows: complete.num_rows() - dated.num_rows(),
    });

    // 4) age
    let dob = required_column(&dated, Layer::Cleaned, "date_of_birth")?
        .as_primitive::<Date32Type>();
    let ages: Int64Array = (0..dob.len())
        .map(|i| dob.value_as_date(i).map(|d| age_on(d, opts.as_of)))
        .collect();
    let ages: ArrayRef = Arc::new(ages);
    if let Some(stats) = describe_column(AGE_COLUMN, &ages) {
        sink.record(Diagnostic::Statistics {
            stage: Stage::Clean,
            columns: vec![stats],
        });
    }

    let cleaned = append_column(&dated, AGE_COLUMN, ages)?;
    debug!(rows_in = batch.num_rows(), rows_out = cleaned.num_rows(), "cleaned batch");
    Ok(cleaned)
}

/// Keep only rows where every required column is non-null.
fn drop_incomplete(batch: &RecordBatch) -> StageResult<RecordBatch> {
    let columns = REQUIRED_COLUMNS
        .iter()
        .map(|name| required_column(batch, Layer::Ingested, name))
        .collect::<StageResult<Vec<_>>>()?;

    let mut keep: Option<BooleanArray> = None;
    for col in columns {
        let present = is_not_null(col.as_ref())?;
        keep = Some(match keep {
            Some(acc) => and(&acc, &present)?,
            None => present,
        });
    }
    match keep {
        Some(mask) => Ok(filter_record_batch(batch, &mask)?),
        None => Ok(batch.clone()),
    }
}

/// Insert `@` before the first `example` of an address that has no `@` yet.
/// Anything else is left alone, including other malformed addresses.
pub fn repair_email(email: &str) -> Option<String> {
    if email.contains('@') || !email.contains("example") {
        return None;
    }
    Some(email.replacen("example", "@example", 1))
}

/// Repair a whole column in parallel. Returns the new column, in the same
/// order, plus the repaired values.
fn repair_emails(emails: &StringArray) -> (StringArray, Vec<String>) {
    let fixed: Vec<(Option<String>, bool)> = (0..emails.len())
        .into_par_iter()
        .map(|i| {
            if emails.is_null(i) {
                return (None, false);
            }
            let email = emails.value(i);
            match repair_email(email) {
                Some(repaired) => (Some(repaired), true),
                None => (Some(email.to_string()), false),
            }
        })
        .collect();

    let repaired = fixed
        .iter()
        .filter(|(_, changed)| *changed)
        .filter_map(|(value, _)| value.clone())
        .collect();
    let column = fixed.into_iter().map(|(value, _)| value).collect();
    (column, repaired)
}

/// Days since 1970-01-01, the Date32 representation.
fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAY as i32
}

fn parse_dates(raw: &StringArray) -> Date32Array {
    raw.iter()
        .map(|v| v.and_then(parse_date).map(days_since_epoch))
        .collect()
}

fn single_column(name: &str, values: Vec<String>) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values)) as ArrayRef])
}
