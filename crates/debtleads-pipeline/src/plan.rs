//! Installment-plan tables → typed plan records.

use arrow::array::StringArray;
use arrow::record_batch::RecordBatch;
use debtleads_core::plan::NEGOTIATION_FIELDS;
use debtleads_core::{InstallmentPlanRecord, NegotiationTerms, PlanConfig, debt};
use tracing::{debug, info};

use crate::table::{first_present, text_at, text_column};
use crate::{PipelineError, Stage};

/// Concatenate every plan table into a single list of plan records.
///
/// Tables are taken in the order given and rows are never deduplicated.
/// The identifier column is looked up under `config.id_column` (or the
/// canonical `taxpayer_id`), each allow-listed attribute under its source
/// name (or canonical name). Every other column is ignored. Rows with a
/// null identifier are skipped; identifiers are rendered as plain text and
/// otherwise left untouched.
pub fn collect_plans(
    tables: &[RecordBatch],
    config: &PlanConfig,
) -> Result<Vec<InstallmentPlanRecord>, PipelineError> {
    if tables.is_empty() {
        return Err(PipelineError::InputNotFound(
            "no installment-plan table was supplied".into(),
        ));
    }

    let mut plans = Vec::new();
    for (n, table) in tables.iter().enumerate() {
        let before = plans.len();
        read_table(table, config, &mut plans)?;
        debug!(table = n, rows = plans.len() - before, "read plan table");
    }

    info!(tables = tables.len(), plans = plans.len(), "collected installment plans");
    Ok(plans)
}

fn read_table(
    table: &RecordBatch,
    config: &PlanConfig,
    out: &mut Vec<InstallmentPlanRecord>,
) -> Result<(), PipelineError> {
    let ids = first_present(table, &[config.id_column.as_str(), debt::TAXPAYER_ID])
        .ok_or_else(|| PipelineError::missing(Stage::Plan, &config.id_column))?;
    let ids = text_column(ids)?;

    let sources = config.columns.source_names();
    let mut attributes: Vec<StringArray> = Vec::with_capacity(NEGOTIATION_FIELDS.len());
    for (source, canonical) in sources.iter().zip(NEGOTIATION_FIELDS) {
        let column = first_present(table, &[*source, canonical])
            .ok_or_else(|| PipelineError::missing(Stage::Plan, *source))?;
        attributes.push(text_column(column)?);
    }

    for i in 0..table.num_rows() {
        let Some(id) = text_at(&ids, i) else {
            continue;
        };
        let values: [Option<String>; NEGOTIATION_FIELDS.len()] =
            std::array::from_fn(|k| text_at(&attributes[k], i).map(str::to_string));
        out.push(InstallmentPlanRecord {
            taxpayer_id: id.to_string(),
            terms: NegotiationTerms::from_values(values),
        });
    }
    Ok(())
}
