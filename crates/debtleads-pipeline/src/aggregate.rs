//! Aggregator: collapses per-debt rows into one row per taxpayer.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;
use debtleads_core::{AggregatedDebtor, Amount, ColumnMap};
use tracing::info;

use crate::table::{amount_at, amount_column, require, text_at, text_column};
use crate::{PipelineError, Stage};

struct Group {
    taxpayer_id: String,
    debtor_name: String,
    jurisdiction: String,
    total: Amount,
}

/// Group `batch` by taxpayer identifier (exact, case-sensitive).
///
/// Name and jurisdiction come from the first row seen for each taxpayer;
/// later rows only contribute their amount. Totals are rounded half-up to
/// cents once, after summation. Output follows first-appearance order.
/// Rows with a null identifier or amount are skipped. A total that leaves
/// the `Decimal128(38, 6)` range is an [`PipelineError::Overflow`].
pub fn aggregate(
    batch: &RecordBatch,
    columns: &ColumnMap,
) -> Result<Vec<AggregatedDebtor>, PipelineError> {
    let ids = text_column(require(batch, &columns.taxpayer_id, Stage::Aggregate)?)?;
    let amounts = amount_column(require(batch, &columns.consolidated_amount, Stage::Aggregate)?)?;
    let names = batch
        .column_by_name(&columns.debtor_name)
        .map(text_column)
        .transpose()?;
    let regions = batch
        .column_by_name(&columns.jurisdiction)
        .map(text_column)
        .transpose()?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for i in 0..batch.num_rows() {
        let (Some(id), Some(amount)) = (text_at(&ids, i), amount_at(&amounts, i)) else {
            continue;
        };
        match index.get(id) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.total = group.total.checked_add(amount).ok_or_else(|| {
                    PipelineError::Overflow {
                        stage: Stage::Aggregate,
                        taxpayer_id: id.to_string(),
                    }
                })?;
            }
            None => {
                let first = |col: &Option<arrow::array::StringArray>| {
                    col.as_ref()
                        .and_then(|c| text_at(c, i))
                        .unwrap_or_default()
                        .to_string()
                };
                index.insert(id.to_string(), groups.len());
                groups.push(Group {
                    taxpayer_id: id.to_string(),
                    debtor_name: first(&names),
                    jurisdiction: first(&regions),
                    total: amount,
                });
            }
        }
    }

    let debtors: Vec<AggregatedDebtor> = groups
        .into_iter()
        .map(|g| AggregatedDebtor {
            taxpayer_id: g.taxpayer_id,
            debtor_name: g.debtor_name,
            jurisdiction: g.jurisdiction,
            total_debt: g.total.round_cents(),
        })
        .collect();

    info!(
        rows = batch.num_rows(),
        debtors = debtors.len(),
        "aggregated debts per taxpayer"
    );
    Ok(debtors)
}
