//! Column access helpers shared by the pipeline stages.
//!
//! Source tables arrive with loosely typed columns (everything `Utf8` from a
//! delimited reader, numbers from a re-imported report, ...). These helpers
//! resolve a column by name and coerce it to the type a stage needs.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Decimal128Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use debtleads_core::Amount;
use debtleads_core::amount::SCALE;
use debtleads_core::debt::AMOUNT_TYPE;

use crate::{PipelineError, Stage};

/// Look up a column by name, failing with a schema error naming it.
pub(crate) fn require<'a>(
    batch: &'a RecordBatch,
    name: &str,
    stage: Stage,
) -> Result<&'a ArrayRef, PipelineError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::missing(stage, name))
}

/// First of `names` present in the batch.
pub(crate) fn first_present<'a>(batch: &'a RecordBatch, names: &[&str]) -> Option<&'a ArrayRef> {
    names.iter().find_map(|name| batch.column_by_name(name))
}

/// Render any column as plain strings. Nulls stay null.
pub(crate) fn text_column(array: &ArrayRef) -> Result<StringArray, ArrowError> {
    let utf8 = match array.data_type() {
        DataType::Utf8 => Arc::clone(array),
        _ => cast(array, &DataType::Utf8)?,
    };
    Ok(utf8.as_string::<i32>().clone())
}

/// Coerce a column to fixed-point amounts (`Decimal128(38, 6)`).
///
/// Text is parsed with [`Amount::parse`], so both `1.234,56` and `1234.56`
/// are understood; unparsable values become null. Numeric columns are cast.
pub(crate) fn amount_column(array: &ArrayRef) -> Result<Decimal128Array, ArrowError> {
    match array.data_type() {
        DataType::Decimal128(precision, scale) if *precision == 38 && *scale == SCALE => {
            Ok(array.as_primitive::<arrow::datatypes::Decimal128Type>().clone())
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let text = text_column(array)?;
            let values: Vec<Option<i128>> = text
                .iter()
                .map(|v| v.and_then(Amount::parse).map(Amount::micros))
                .collect();
            decimal_array(values)
        }
        _ => {
            let cast_array = cast(array, &AMOUNT_TYPE)?;
            Ok(cast_array
                .as_primitive::<arrow::datatypes::Decimal128Type>()
                .clone())
        }
    }
}

pub(crate) fn decimal_array(values: Vec<Option<i128>>) -> Result<Decimal128Array, ArrowError> {
    Decimal128Array::from(values).with_precision_and_scale(38, SCALE)
}

/// Value at `i` as an [`Amount`], or `None` when null.
pub(crate) fn amount_at(array: &Decimal128Array, i: usize) -> Option<Amount> {
    array
        .is_valid(i)
        .then(|| Amount::from_micros(array.value(i)))
}

/// Value at `i`, or `None` when null.
pub(crate) fn text_at(array: &StringArray, i: usize) -> Option<&str> {
    array.is_valid(i).then(|| array.value(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};

    #[test]
    fn amount_column_parses_locale_text() {
        let array: ArrayRef = Arc::new(StringArray::from(vec![
            Some("1.234,56"),
            Some("1234.56"),
            Some("n/a"),
            None,
        ]));
        let amounts = amount_column(&array).unwrap();
        assert_eq!(amounts.data_type(), &AMOUNT_TYPE);
        assert_eq!(amount_at(&amounts, 0), Amount::parse("1234.56"));
        assert_eq!(amount_at(&amounts, 1), Amount::parse("1234.56"));
        assert_eq!(amount_at(&amounts, 2), None);
        assert_eq!(amount_at(&amounts, 3), None);
    }

    #[test]
    fn amount_column_casts_numbers() {
        let floats: ArrayRef = Arc::new(Float64Array::from(vec![Some(10.5), None]));
        let amounts = amount_column(&floats).unwrap();
        assert_eq!(amount_at(&amounts, 0), Amount::parse("10.5"));
        assert!(amounts.is_null(1));

        let ints: ArrayRef = Arc::new(Int64Array::from(vec![200_000]));
        let amounts = amount_column(&ints).unwrap();
        assert_eq!(amount_at(&amounts, 0), Some(Amount::from_units(200_000)));
    }

    #[test]
    fn amount_column_keeps_decimals() {
        let array: ArrayRef =
            Arc::new(decimal_array(vec![Some(Amount::from_units(7).micros())]).unwrap());
        let amounts = amount_column(&array).unwrap();
        assert_eq!(amount_at(&amounts, 0), Some(Amount::from_units(7)));
    }

    #[test]
    fn amount_column_widens_narrow_decimals() {
        let narrow: ArrayRef = Arc::new(
            Decimal128Array::from(vec![Some(Amount::from_units(7).micros())])
                .with_precision_and_scale(20, SCALE)
                .unwrap(),
        );
        let amounts = amount_column(&narrow).unwrap();
        assert_eq!(amounts.data_type(), &AMOUNT_TYPE);
        assert_eq!(amount_at(&amounts, 0), Some(Amount::from_units(7)));
    }

    #[test]
    fn text_column_casts_integers() {
        let ids: ArrayRef = Arc::new(Int64Array::from(vec![Some(93011211000100), None]));
        let text = text_column(&ids).unwrap();
        assert_eq!(text_at(&text, 0), Some("93011211000100"));
        assert_eq!(text_at(&text, 1), None);
    }
}
