use arrow::record_batch::RecordBatch;
use debtleads_core::{AggregatedDebtor, Amount, ColumnMap, MatchStrategy, PlanConfig, Settings};
use tracing::{info, info_span};

use crate::PipelineError;
use crate::aggregate::aggregate;
use crate::filter::{FilterStats, RecordFilter};
use crate::matcher::{MatchOutcome, PlanMatcher};
use crate::plan::collect_plans;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Filtered per-debt rows, administrative columns removed.
    pub detailed: RecordBatch,
    pub stats: FilterStats,
    pub debtors: Vec<AggregatedDebtor>,
    /// Present when plan tables were supplied.
    pub matches: Option<MatchOutcome>,
}

/// Filter → aggregate → (optionally) match, parameterized by [`Settings`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    filter: RecordFilter,
    columns: ColumnMap,
    plans: PlanConfig,
    matcher: PlanMatcher,
}

impl Pipeline {
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        Ok(Self {
            filter: RecordFilter::new(&settings.filter, &settings.columns)?,
            columns: settings.columns.clone(),
            plans: settings.plans.clone(),
            matcher: PlanMatcher::from_config(&settings.plans),
        })
    }

    /// Override the minimum amount for this run.
    pub fn with_minimum(mut self, minimum: Amount) -> Result<Self, PipelineError> {
        self.filter = self.filter.with_minimum(minimum)?;
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.matcher = self.matcher.with_strategy(strategy);
        self
    }

    pub fn minimum(&self) -> Amount {
        self.filter.minimum()
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.matcher.strategy()
    }

    /// Run every stage over `raw`. When `plan_tables` is `Some`, it must hold
    /// at least one table.
    pub fn run(
        &self,
        raw: &RecordBatch,
        plan_tables: Option<&[RecordBatch]>,
    ) -> Result<PipelineOutput, PipelineError> {
        let _span = info_span!("pipeline", minimum = %self.filter.minimum()).entered();

        let (detailed, stats) = self.filter.apply_with_stats(raw)?;
        let debtors = aggregate(&detailed, &self.columns)?;

        let matches = match plan_tables {
            Some(tables) => {
                let plans = collect_plans(tables, &self.plans)?;
                Some(self.matcher.apply(&debtors, &plans))
            }
            None => None,
        };

        info!(
            raw = raw.num_rows(),
            detailed = detailed.num_rows(),
            debtors = debtors.len(),
            matched = matches.is_some(),
            "pipeline finished"
        );
        Ok(PipelineOutput {
            detailed,
            stats,
            debtors,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::plan::tests::plan_table;

    fn raw(rows: &[(&str, &str, &str, &str)]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("CPF_CNPJ", DataType::Utf8, true),
            Field::new("NOME_DEVEDOR", DataType::Utf8, true),
            Field::new("UF_DEVEDOR", DataType::Utf8, true),
            Field::new("VALOR_CONSOLIDADO", DataType::Utf8, true),
            Field::new("TIPO_CREDITO", DataType::Utf8, true),
        ]));
        let column = |values: Vec<&str>| -> ArrayRef { Arc::new(StringArray::from(values)) };
        RecordBatch::try_new(
            schema,
            vec![
                column(rows.iter().map(|r| r.0).collect()),
                column(rows.iter().map(|r| r.1).collect()),
                column(rows.iter().map(|r| r.2).collect()),
                column(rows.iter().map(|r| r.3).collect()),
                column(vec!["IRPJ"; rows.len()]),
            ],
        )
        .unwrap()
    }

    fn scenario() -> RecordBatch {
        raw(&[
            ("A/0001-1", "ACME MUNICIPIO", "RS", "500000"),
            ("A/0001-2", "ACME LTDA", "RS", "200000"),
            ("B/0001-1", "FOO LTDA", "SP", "900000"),
            ("C/0001-3", "BAR SA", "RS", "300000"),
        ])
    }

    #[test]
    fn runs_without_plans() {
        let pipeline = Pipeline::new(&Settings::default()).unwrap();
        let out = pipeline.run(&scenario(), None).unwrap();
        assert_eq!(out.detailed.num_rows(), 2);
        assert!(out.detailed.column_by_name("TIPO_CREDITO").is_none());
        assert_eq!(out.debtors.len(), 2);
        assert_eq!(out.debtors[0].taxpayer_id, "A/0001-2");
        assert_eq!(out.stats.excluded_name, 1);
        assert!(out.matches.is_none());
    }

    #[test]
    fn matches_when_plans_supplied() {
        let settings = Settings::default();
        let pipeline = Pipeline::new(&settings).unwrap();
        let plans = [plan_table(&settings.plans, &[("A/0001-2", "Em dia")])];
        let out = pipeline.run(&scenario(), Some(&plans)).unwrap();
        let outcome = out.matches.unwrap();
        assert_eq!(outcome.debtors_with_plan(), 1);
        assert_eq!(outcome.debtors_without_plan(), 1);
    }

    #[test]
    fn empty_plan_list_aborts() {
        let pipeline = Pipeline::new(&Settings::default()).unwrap();
        let err = pipeline.run(&scenario(), Some(&[])).unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound(_)));
    }

    #[test]
    fn minimum_override_and_strategy() {
        let pipeline = Pipeline::new(&Settings::default())
            .unwrap()
            .with_minimum(Amount::from_units(250_000))
            .unwrap()
            .with_strategy(MatchStrategy::Summarized);
        assert_eq!(pipeline.strategy(), MatchStrategy::Summarized);
        let out = pipeline.run(&scenario(), None).unwrap();
        assert_eq!(out.debtors.len(), 1);
        assert_eq!(out.debtors[0].taxpayer_id, "C/0001-3");

        assert!(
            Pipeline::new(&Settings::default())
                .unwrap()
                .with_minimum(Amount::ZERO)
                .is_err()
        );
    }
}
