//! Typed report rows → Arrow record batches for export.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, UInt64Array};
use arrow::record_batch::RecordBatch;
use debtleads_core::plan::NEGOTIATION_FIELDS;
use debtleads_core::{AggregatedDebtor, AnnotatedDebtor, MatchedDebtor, NegotiationTerms, debt, plan};

use crate::PipelineError;
use crate::matcher::MatchOutcome;

fn debtor_columns<'a>(rows: impl Iterator<Item = &'a AggregatedDebtor> + Clone) -> Vec<ArrayRef> {
    vec![
        Arc::new(StringArray::from_iter_values(
            rows.clone().map(|d| d.taxpayer_id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.clone().map(|d| d.debtor_name.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.clone().map(|d| d.jurisdiction.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.map(|d| d.total_debt.to_f64()),
        )),
    ]
}

fn term_columns<'a>(rows: impl Iterator<Item = &'a NegotiationTerms> + Clone) -> Vec<ArrayRef> {
    (0..NEGOTIATION_FIELDS.len())
        .map(|k| {
            let values: StringArray = rows.clone().map(|t| t.values()[k]).collect();
            Arc::new(values) as ArrayRef
        })
        .collect()
}

/// One row per debtor, canonical debtor columns.
pub fn debtors_batch(rows: &[AggregatedDebtor]) -> Result<RecordBatch, PipelineError> {
    Ok(RecordBatch::try_new(
        Arc::new(debt::aggregated_schema()),
        debtor_columns(rows.iter()),
    )?)
}

/// Row-level matches: debtor columns followed by the negotiation attributes.
pub fn matched_batch(rows: &[MatchedDebtor]) -> Result<RecordBatch, PipelineError> {
    let mut columns = debtor_columns(rows.iter().map(|m| &m.debtor));
    columns.extend(term_columns(rows.iter().map(|m| &m.terms)));
    Ok(RecordBatch::try_new(Arc::new(plan::matched_schema()), columns)?)
}

/// Summarized rows: debtor columns, plan flag and count, joined attributes.
pub fn annotated_batch(rows: &[AnnotatedDebtor]) -> Result<RecordBatch, PipelineError> {
    let mut columns = debtor_columns(rows.iter().map(|a| &a.debtor));
    columns.push(Arc::new(BooleanArray::from(
        rows.iter().map(|a| a.has_plan).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(UInt64Array::from_iter_values(
        rows.iter().map(|a| a.negotiation_count),
    )));
    columns.extend(term_columns(rows.iter().map(|a| &a.terms)));
    Ok(RecordBatch::try_new(Arc::new(plan::annotated_schema()), columns)?)
}

/// Named report tables for a match outcome: `matched`/`unmatched` or `summary`.
pub fn outcome_batches(
    outcome: &MatchOutcome,
) -> Result<Vec<(&'static str, RecordBatch)>, PipelineError> {
    Ok(match outcome {
        MatchOutcome::RowLevel { matched, unmatched } => vec![
            ("matched", matched_batch(matched)?),
            ("unmatched", debtors_batch(unmatched)?),
        ],
        MatchOutcome::Summarized { debtors } => vec![("summary", annotated_batch(debtors)?)],
    })
}
