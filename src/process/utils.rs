use arrow::{
    array::{ArrayRef, AsArray, StringArray},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
    util::pretty::pretty_format_batches,
};
use std::sync::Arc;

use crate::error::{StageError, StageResult};
use crate::store::Layer;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Parse a cleaned cell as a float, the way a numeric CSV column would be read.
pub fn parse_number(raw: &str) -> Option<f64> {
    clean_str(raw).parse::<f64>().ok()
}

/// Look up `name` in `batch`, failing with `MissingRequiredColumn`.
pub fn required_column<'a>(
    batch: &'a RecordBatch,
    layer: Layer,
    name: &str,
) -> StageResult<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StageError::MissingRequiredColumn {
            layer,
            column: name.to_string(),
        })
}

/// View any column as UTF-8, casting when the layer stored it typed.
pub fn as_strings(col: &ArrayRef) -> Result<StringArray, ArrowError> {
    let utf8 = match col.data_type() {
        DataType::Utf8 => col.clone(),
        _ => cast(col, &DataType::Utf8)?,
    };
    Ok(utf8.as_string::<i32>().clone())
}

/// Swap the column called `name` for `array`, keeping its position.
pub fn replace_column(
    batch: &RecordBatch,
    name: &str,
    array: ArrayRef,
) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let idx = schema.index_of(name)?;

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields[idx] = Field::new(name, array.data_type().clone(), true);
    let mut columns = batch.columns().to_vec();
    columns[idx] = array;

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
}

/// Append `array` as a new trailing column, replacing any column of the same name.
pub fn append_column(
    batch: &RecordBatch,
    name: &str,
    array: ArrayRef,
) -> Result<RecordBatch, ArrowError> {
    if batch.column_by_name(name).is_some() {
        return replace_column(batch, name, array);
    }
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(name, array.data_type().clone(), true));
    let mut columns = batch.columns().to_vec();
    columns.push(array);

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
}

/// Render the first `rows` rows as an ASCII table.
pub fn render_head(batch: &RecordBatch, rows: usize) -> Result<String, ArrowError> {
    let head = batch.slice(0, rows.min(batch.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Utf8, true),
            Field::new("b", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![1, 2])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn clean_str_strips_quotes_and_space() {
        assert_eq!(clean_str("  \"2000-01-02\" "), "2000-01-02");
        assert_eq!(clean_str("plain"), "plain");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn parse_number_accepts_padded_values() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("007"), Some(7.0));
        assert_eq!(parse_number("active"), None);
    }

    #[test]
    fn typed_columns_read_as_strings() {
        let b = batch();
        let s = as_strings(b.column(1)).unwrap();
        assert_eq!(s.value(1), "2");
    }

    #[test]
    fn replace_and_append_keep_positions() {
        let b = batch();
        let swapped = replace_column(&b, "a", Arc::new(Int64Array::from(vec![7, 8]))).unwrap();
        assert_eq!(swapped.schema().field(0).name(), "a");
        assert_eq!(swapped.schema().field(0).data_type(), &DataType::Int64);

        let grown = append_column(&b, "c", Arc::new(Int64Array::from(vec![0, 0]))).unwrap();
        assert_eq!(grown.num_columns(), 3);
        assert_eq!(grown.schema().field(2).name(), "c");

        let missing = required_column(&b, Layer::Ingested, "zzz").unwrap_err();
        assert!(matches!(missing, StageError::MissingRequiredColumn { .. }));
    }

    #[test]
    fn render_head_limits_rows() {
        let table = render_head(&batch(), 1).unwrap();
        assert!(table.contains("| x "));
        assert!(!table.contains("| y "));
    }
}
