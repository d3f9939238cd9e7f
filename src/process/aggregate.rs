use arrow::{
    array::{Array, ArrayRef, AsArray, Int64Array, StringArray},
    compute::cast,
    datatypes::{DataType, Field, Float64Type, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::{StageError, StageResult};
use crate::pipeline::{Stage, StageReport};
use crate::process::{
    clean::AGE_COLUMN,
    utils::{as_strings, parse_number, render_head, required_column},
};
use crate::store::{Layer, LayerStore};

pub const STATUS_COLUMN: &str = "subscription_status";

/// Bucket labels for `[0,10) .. [90,100)`. The strings are kept as published
/// downstream even though only the first one matches its bounds.
pub const AGE_LABELS: [&str; 10] = [
    "0-10", "11-20", "21-30", "31-40", "41-50", "51-60", "61-70", "71-80", "81-90", "91-100",
];

/// Catch-all for ages outside `[0,100)` or missing. Sorts after every range.
pub const INVALID_AGE: &str = "Invalid age";

const BUCKET_WIDTH: i64 = 10;

/// Ordinal of the bucket `age` falls in; `AGE_LABELS.len()` for the sentinel.
pub fn bucket_of(age: Option<i64>) -> usize {
    match age {
        Some(a) if (0..BUCKET_WIDTH * AGE_LABELS.len() as i64).contains(&a) => {
            (a / BUCKET_WIDTH) as usize
        }
        _ => AGE_LABELS.len(),
    }
}

pub fn bucket_label(ordinal: usize) -> &'static str {
    AGE_LABELS.get(ordinal).copied().unwrap_or(INVALID_AGE)
}

/// One output row before it is turned into columns.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Group {
    bucket: usize,
    status: Option<String>,
    user_count: i64,
}

/// Bucket ordinal ascending, then count descending. Ties fall back to status
/// with nulls last so reruns produce identical layers.
fn group_order(a: &Group, b: &Group) -> Ordering {
    a.bucket
        .cmp(&b.bucket)
        .then_with(|| b.user_count.cmp(&a.user_count))
        .then_with(|| match (&a.status, &b.status) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Read the cleaned layer, count users per age range and status, and write
/// the aggregated layer.
#[instrument(level = "info", skip(store, sink))]
pub fn aggregate(
    store: &dyn LayerStore,
    sink: &dyn DiagnosticsSink,
    sample_rows: usize,
) -> StageResult<StageReport> {
    let cleaned = store.read(Layer::Cleaned)?;
    sink.record(Diagnostic::RowCount {
        stage: Stage::Aggregate,
        rows: cleaned.num_rows(),
    });

    let summary = aggregate_batch(&cleaned)?;
    sink.record(Diagnostic::Table {
        stage: Stage::Aggregate,
        table: render_head(&summary, summary.num_rows())?,
    });

    store.write(Layer::Aggregated, &summary)?;
    sink.record(Diagnostic::Written {
        stage: Stage::Aggregate,
        layer: Layer::Aggregated,
        rows: summary.num_rows(),
        bytes: store.size_bytes(Layer::Aggregated),
    });
    sink.record(Diagnostic::Sample {
        stage: Stage::Aggregate,
        label: "aggregated sample".into(),
        table: render_head(&summary, sample_rows)?,
    });

    Ok(StageReport {
        stage: Stage::Aggregate,
        rows_in: cleaned.num_rows(),
        rows_out: summary.num_rows(),
    })
}

/// Group a cleaned batch into `age_range`, `subscription_status`, `user_count`.
///
/// Every input row is counted exactly once: unbinnable ages go to
/// [`INVALID_AGE`] and null statuses form their own group.
pub fn aggregate_batch(batch: &RecordBatch) -> StageResult<RecordBatch> {
    let age_col = batch
        .column_by_name(AGE_COLUMN)
        .ok_or_else(|| StageError::MissingDerivedColumn {
            layer: Layer::Cleaned,
            column: AGE_COLUMN.to_string(),
        })?;
    let status = as_strings(required_column(batch, Layer::Cleaned, STATUS_COLUMN)?)?;
    let ages = ages_of(age_col)?;

    let mut counts: HashMap<(usize, Option<&str>), i64> = HashMap::new();
    for (i, age) in ages.into_iter().enumerate() {
        let key = (bucket_of(age), status.is_valid(i).then(|| status.value(i)));
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut groups: Vec<Group> = counts
        .into_iter()
        .map(|((bucket, status), user_count)| Group {
            bucket,
            status: status.map(str::to_string),
            user_count,
        })
        .collect();
    groups.sort_by(group_order);
    debug!(groups = groups.len(), rows = batch.num_rows(), "grouped cleaned rows");

    Ok(to_batch(&groups)?)
}

/// Whole-year ages from a typed or textual column, floored so a text cell
/// and a float cell with the same value land in the same bucket. Cells that
/// are not finite numbers come back as `None`.
fn ages_of(col: &ArrayRef) -> Result<Vec<Option<i64>>, ArrowError> {
    let years: Vec<Option<f64>> = if col.data_type() == &DataType::Utf8 {
        col.as_string::<i32>()
            .iter()
            .map(|v| v.and_then(parse_number))
            .collect()
    } else {
        cast(col, &DataType::Float64)?
            .as_primitive::<Float64Type>()
            .iter()
            .collect()
    };
    Ok(years
        .into_iter()
        .map(|v| v.filter(|n| n.is_finite()).map(|n| n.floor() as i64))
        .collect())
}

fn to_batch(groups: &[Group]) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("age_range", DataType::Utf8, false),
        Field::new(STATUS_COLUMN, DataType::Utf8, true),
        Field::new("user_count", DataType::Int64, false),
    ]));
    let ranges: StringArray = groups.iter().map(|g| Some(bucket_label(g.bucket))).collect();
    let statuses: StringArray = groups.iter().map(|g| g.status.as_deref()).collect();
    let counts = Int64Array::from_iter_values(groups.iter().map(|g| g.user_count));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ranges) as ArrayRef,
            Arc::new(statuses),
            Arc::new(counts),
        ],
    )
}
