//! Plan Matcher: cross-references debtors against installment plans.
//!
//! Two strategies are available:
//!
//! - [`MatchStrategy::RowLevel`]: inner join, one row per (debtor, plan)
//!   pair, plus the debtors with no plan at all.
//! - [`MatchStrategy::Summarized`]: plans are first collapsed per taxpayer
//!   (distinct values joined with a separator, negotiations counted), then
//!   attached to every debtor with a `has_plan` flag.
//!
//! Identifiers are compared as exact strings.

use std::collections::{HashMap, HashSet};

use debtleads_core::plan::NEGOTIATION_FIELDS;
use debtleads_core::{
    AggregatedDebtor, AnnotatedDebtor, InstallmentPlanRecord, MatchStrategy, MatchedDebtor,
    NegotiationTerms, PlanConfig,
};
use serde::Serialize;
use tracing::info;

/// Result of matching debtors against plans.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum MatchOutcome {
    RowLevel {
        matched: Vec<MatchedDebtor>,
        unmatched: Vec<AggregatedDebtor>,
    },
    Summarized {
        debtors: Vec<AnnotatedDebtor>,
    },
}

impl MatchOutcome {
    pub fn strategy(&self) -> MatchStrategy {
        match self {
            Self::RowLevel { .. } => MatchStrategy::RowLevel,
            Self::Summarized { .. } => MatchStrategy::Summarized,
        }
    }

    /// Number of distinct debtors with at least one plan.
    pub fn debtors_with_plan(&self) -> usize {
        match self {
            Self::RowLevel { matched, .. } => matched
                .iter()
                .map(|m| m.debtor.taxpayer_id.as_str())
                .collect::<HashSet<_>>()
                .len(),
            Self::Summarized { debtors } => debtors.iter().filter(|d| d.has_plan).count(),
        }
    }

    /// Number of debtors with no plan.
    pub fn debtors_without_plan(&self) -> usize {
        match self {
            Self::RowLevel { unmatched, .. } => unmatched.len(),
            Self::Summarized { debtors } => debtors.iter().filter(|d| !d.has_plan).count(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanMatcher {
    strategy: MatchStrategy,
    separator: String,
}

impl PlanMatcher {
    pub fn new(strategy: MatchStrategy, separator: impl Into<String>) -> Self {
        Self {
            strategy,
            separator: separator.into(),
        }
    }

    pub fn from_config(config: &PlanConfig) -> Self {
        Self::new(config.strategy, config.separator.clone())
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn apply(
        &self,
        debtors: &[AggregatedDebtor],
        plans: &[InstallmentPlanRecord],
    ) -> MatchOutcome {
        let outcome = match self.strategy {
            MatchStrategy::RowLevel => row_level(debtors, plans),
            MatchStrategy::Summarized => summarized(debtors, plans, &self.separator),
        };
        info!(
            strategy = ?self.strategy,
            debtors = debtors.len(),
            plans = plans.len(),
            with_plan = outcome.debtors_with_plan(),
            without_plan = outcome.debtors_without_plan(),
            "matched debtors against installment plans"
        );
        outcome
    }
}

/// Plans grouped by taxpayer, preserving plan order within each group.
fn index_plans(plans: &[InstallmentPlanRecord]) -> HashMap<&str, Vec<&InstallmentPlanRecord>> {
    let mut index: HashMap<&str, Vec<&InstallmentPlanRecord>> = HashMap::new();
    for plan in plans {
        index.entry(plan.taxpayer_id.as_str()).or_default().push(plan);
    }
    index
}

fn row_level(debtors: &[AggregatedDebtor], plans: &[InstallmentPlanRecord]) -> MatchOutcome {
    let index = index_plans(plans);
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for debtor in debtors {
        match index.get(debtor.taxpayer_id.as_str()) {
            Some(group) => matched.extend(group.iter().map(|plan| MatchedDebtor {
                debtor: debtor.clone(),
                terms: plan.terms.clone(),
            })),
            None => unmatched.push(debtor.clone()),
        }
    }

    MatchOutcome::RowLevel { matched, unmatched }
}

fn summarized(
    debtors: &[AggregatedDebtor],
    plans: &[InstallmentPlanRecord],
    separator: &str,
) -> MatchOutcome {
    let index = index_plans(plans);
    let debtors = debtors
        .iter()
        .map(|debtor| match index.get(debtor.taxpayer_id.as_str()) {
            Some(group) => AnnotatedDebtor {
                debtor: debtor.clone(),
                has_plan: true,
                negotiation_count: group.len() as u64,
                terms: summarize(group, separator),
            },
            None => AnnotatedDebtor {
                debtor: debtor.clone(),
                has_plan: false,
                negotiation_count: 0,
                terms: NegotiationTerms::default(),
            },
        })
        .collect();
    MatchOutcome::Summarized { debtors }
}

/// Distinct non-null values per attribute, in first-seen order.
fn summarize(group: &[&InstallmentPlanRecord], separator: &str) -> NegotiationTerms {
    let rows: Vec<_> = group.iter().map(|plan| plan.terms.values()).collect();
    let values: [Option<String>; NEGOTIATION_FIELDS.len()] = std::array::from_fn(|k| {
        let mut seen: Vec<&str> = Vec::new();
        for value in rows.iter().filter_map(|row| row[k]) {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        (!seen.is_empty()).then(|| seen.join(separator))
    });
    NegotiationTerms::from_values(values)
}
