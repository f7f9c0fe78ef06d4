//! Record filter: selects in-scope debt rows from the raw table.
//!
//! A row is kept when all of the following hold:
//!
//! 1. its jurisdiction equals the target (checked first, it is the narrowest)
//! 2. its taxpayer identifier carries the legal-entity marker
//! 3. its debtor name contains none of the exclusion terms (case-insensitive)
//! 4. its consolidated amount is strictly greater than the minimum
//!
//! Rows with a null identifier, name, jurisdiction or amount are dropped.
//! Administrative columns listed in the configuration are removed when
//! present. The output keeps the input column names and carries the amount
//! column as `Decimal128(38, 6)`, so filtering an already-filtered table is a
//! no-op.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use debtleads_core::config::validate_threshold;
use debtleads_core::debt::AMOUNT_TYPE;
use debtleads_core::{Amount, ColumnMap, FilterConfig};
use tracing::{debug, info};

use crate::table::{amount_at, amount_column, require, text_at, text_column};
use crate::{PipelineError, Stage};

/// Compiled filter parameters for one run.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    columns: ColumnMap,
    jurisdiction: String,
    entity_marker: String,
    /// Upper-cased once so each row needs a single case conversion.
    exclusions: Vec<String>,
    minimum: Amount,
    drop_columns: Vec<String>,
}

/// Why rows were rejected, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub input: usize,
    pub wrong_jurisdiction: usize,
    pub not_entity: usize,
    pub excluded_name: usize,
    pub below_minimum: usize,
    pub kept: usize,
}

impl RecordFilter {
    /// Build a filter from configuration; fails when the minimum is not positive.
    pub fn new(config: &FilterConfig, columns: &ColumnMap) -> Result<Self, PipelineError> {
        validate_threshold(config.minimum_amount)?;
        Ok(Self {
            columns: columns.clone(),
            jurisdiction: config.jurisdiction.clone(),
            entity_marker: config.entity_marker.clone(),
            exclusions: config
                .exclusion_terms
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_uppercase())
                .collect(),
            minimum: config.minimum_amount,
            drop_columns: config.drop_columns.clone(),
        })
    }

    /// Same filter with a different minimum amount.
    pub fn with_minimum(mut self, minimum: Amount) -> Result<Self, PipelineError> {
        validate_threshold(minimum)?;
        self.minimum = minimum;
        Ok(self)
    }

    pub fn minimum(&self) -> Amount {
        self.minimum
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Filter `batch`, returning the surviving rows.
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, PipelineError> {
        self.apply_with_stats(batch).map(|(out, _)| out)
    }

    /// Filter `batch`, also returning per-predicate rejection counts.
    pub fn apply_with_stats(
        &self,
        batch: &RecordBatch,
    ) -> Result<(RecordBatch, FilterStats), PipelineError> {
        let cols = &self.columns;
        let ids = text_column(require(batch, &cols.taxpayer_id, Stage::Filter)?)?;
        let regions = text_column(require(batch, &cols.jurisdiction, Stage::Filter)?)?;
        let names = text_column(require(batch, &cols.debtor_name, Stage::Filter)?)?;
        let amounts = amount_column(require(batch, &cols.consolidated_amount, Stage::Filter)?)?;

        let mut stats = FilterStats {
            input: batch.num_rows(),
            ..FilterStats::default()
        };
        let mask: BooleanArray = (0..batch.num_rows())
            .map(|i| {
                if text_at(&regions, i) != Some(self.jurisdiction.as_str()) {
                    stats.wrong_jurisdiction += 1;
                    return Some(false);
                }
                if !text_at(&ids, i).is_some_and(|id| id.contains(&self.entity_marker)) {
                    stats.not_entity += 1;
                    return Some(false);
                }
                if !text_at(&names, i).is_some_and(|name| !self.is_excluded(name)) {
                    stats.excluded_name += 1;
                    return Some(false);
                }
                if !amount_at(&amounts, i).is_some_and(|a| a > self.minimum) {
                    stats.below_minimum += 1;
                    return Some(false);
                }
                stats.kept += 1;
                Some(true)
            })
            .collect();

        let projected = self.project(batch, Arc::new(amounts) as ArrayRef)?;
        let filtered = filter_record_batch(&projected, &mask)?;

        debug!(?stats, "record filter breakdown");
        info!(
            input = stats.input,
            kept = stats.kept,
            "filtered debt records"
        );
        Ok((filtered, stats))
    }

    fn is_excluded(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.exclusions.iter().any(|term| upper.contains(term.as_str()))
    }

    /// Swap in the coerced amount column and drop administrative columns.
    fn project(&self, batch: &RecordBatch, amounts: ArrayRef) -> Result<RecordBatch, PipelineError> {
        let schema = batch.schema();
        let cols = &self.columns;
        let protected = [
            cols.taxpayer_id.as_str(),
            cols.debtor_name.as_str(),
            cols.jurisdiction.as_str(),
            cols.consolidated_amount.as_str(),
        ];

        let mut fields = Vec::with_capacity(schema.fields().len());
        let mut arrays = Vec::with_capacity(schema.fields().len());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let name = field.name().as_str();
            if name == cols.consolidated_amount {
                fields.push(Field::new(name, AMOUNT_TYPE, true));
                arrays.push(Arc::clone(&amounts));
            } else if protected.contains(&name) || !self.drop_columns.iter().any(|d| d == name) {
                fields.push(field.as_ref().clone());
                arrays.push(Arc::clone(array));
            }
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}
