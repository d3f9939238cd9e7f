use arrow::{
    array::{Array, ArrayRef, AsArray},
    compute::cast,
    datatypes::{DataType, Float64Type},
    record_batch::RecordBatch,
};
use serde::Serialize;

use crate::process::utils::parse_number;

/// Summary of one numeric column: count, mean, sample standard deviation,
/// extremes and quartiles.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// `None` below two values.
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// Statistics for every numeric column of `batch`, in column order.
///
/// Text columns count as numeric when every non-null cell parses as a float,
/// so a raw all-text batch still gets statistics for its numeric columns.
pub fn describe(batch: &RecordBatch) -> Vec<ColumnStats> {
    let schema = batch.schema();
    schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter_map(|(field, col)| {
            let values = numeric_values(col)?;
            summarize(field.name(), values)
        })
        .collect()
}

/// Statistics for a single column, or `None` when it is not numeric.
pub fn describe_column(name: &str, col: &ArrayRef) -> Option<ColumnStats> {
    summarize(name, numeric_values(col)?)
}

fn numeric_values(col: &ArrayRef) -> Option<Vec<f64>> {
    match col.data_type() {
        DataType::Utf8 => {
            let strings = col.as_string::<i32>();
            strings
                .iter()
                .flatten()
                .map(parse_number)
                .collect::<Option<Vec<f64>>>()
        }
        dt if dt.is_numeric() => {
            let floats = cast(col, &DataType::Float64).ok()?;
            Some(
                floats
                    .as_primitive::<Float64Type>()
                    .iter()
                    .flatten()
                    .collect(),
            )
        }
        _ => None,
    }
}

fn summarize(name: &str, mut values: Vec<f64>) -> Option<ColumnStats> {
    values.retain(|v| !v.is_nan());
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = (n > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    Some(ColumnStats {
        column: name.to_string(),
        count: n,
        mean,
        std,
        min: values[0],
        q25: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values[n - 1],
    })
}

/// Linear interpolation between closest ranks over sorted `values`.
fn quantile(values: &[f64], q: f64) -> f64 {
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn text_and_typed_numeric_columns_are_described() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Utf8, true),
            Field::new("age", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), Some("c"), Some("d")]))
                    as ArrayRef,
                Arc::new(StringArray::from(vec![Some("1"), None, Some("3"), Some("2")])),
                Arc::new(Int64Array::from(vec![10, 20, 30, 40])),
            ],
        )
        .unwrap();

        let stats = describe(&batch);
        assert_eq!(stats.len(), 2);

        let score = &stats[0];
        assert_eq!(score.column, "score");
        assert_eq!(score.count, 3);
        assert_eq!(score.mean, 2.0);
        assert_eq!(score.std, Some(1.0));
        assert_eq!(score.median, 2.0);

        let age = &stats[1];
        assert_eq!(age.min, 10.0);
        assert_eq!(age.q25, 17.5);
        assert_eq!(age.median, 25.0);
        assert_eq!(age.q75, 32.5);
        assert_eq!(age.max, 40.0);
    }

    #[test]
    fn single_value_has_no_std_and_empty_columns_are_skipped() {
        let one: ArrayRef = Arc::new(Int64Array::from(vec![Some(5), None]));
        let s = describe_column("x", &one).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.std, None);

        let none: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>, None]));
        assert!(describe_column("y", &none).is_none());
    }

    #[test]
    fn serialises_with_percentile_keys() {
        let col: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        let json = serde_json::to_value(describe_column("n", &col).unwrap()).unwrap();
        assert_eq!(json["50%"], 1.5);
    }
}
