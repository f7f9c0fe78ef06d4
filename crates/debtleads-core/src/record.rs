//! Typed rows produced by the pipeline stages.

use serde::{Deserialize, Serialize};

use crate::Amount;
use crate::schema::plan::NEGOTIATION_FIELDS;

/// One row per distinct taxpayer surviving the record filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedDebtor {
    pub taxpayer_id: String,
    /// First name seen for this taxpayer, in input order.
    pub debtor_name: String,
    /// First jurisdiction seen for this taxpayer, in input order.
    pub jurisdiction: String,
    /// Sum of the consolidated amounts, rounded half-up to cents after summation.
    pub total_debt: Amount,
}

/// Negotiation attributes of an installment plan, carried through as text.
///
/// The plan spreadsheet is produced outside this system, so values are
/// kept exactly as the source rendered them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationTerms {
    pub negotiation_type: Option<String>,
    pub modality: Option<String>,
    pub status: Option<String>,
    pub installments_granted: Option<String>,
    pub installments_overdue: Option<String>,
    pub consolidated_value: Option<String>,
    pub principal_value: Option<String>,
    pub penalty_value: Option<String>,
    pub interest_value: Option<String>,
    pub legal_charge_value: Option<String>,
}

impl NegotiationTerms {
    /// Build from values ordered like [`NEGOTIATION_FIELDS`].
    pub fn from_values(values: [Option<String>; NEGOTIATION_FIELDS.len()]) -> Self {
        let [
            negotiation_type,
            modality,
            status,
            installments_granted,
            installments_overdue,
            consolidated_value,
            principal_value,
            penalty_value,
            interest_value,
            legal_charge_value,
        ] = values;
        Self {
            negotiation_type,
            modality,
            status,
            installments_granted,
            installments_overdue,
            consolidated_value,
            principal_value,
            penalty_value,
            interest_value,
            legal_charge_value,
        }
    }

    /// Values ordered like [`NEGOTIATION_FIELDS`].
    pub fn values(&self) -> [Option<&str>; NEGOTIATION_FIELDS.len()] {
        [
            self.negotiation_type.as_deref(),
            self.modality.as_deref(),
            self.status.as_deref(),
            self.installments_granted.as_deref(),
            self.installments_overdue.as_deref(),
            self.consolidated_value.as_deref(),
            self.principal_value.as_deref(),
            self.penalty_value.as_deref(),
            self.interest_value.as_deref(),
            self.legal_charge_value.as_deref(),
        ]
    }
}

/// One negotiated payment plan, keyed by taxpayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlanRecord {
    pub taxpayer_id: String,
    #[serde(flatten)]
    pub terms: NegotiationTerms,
}

/// Inner-join row: a debtor paired with one of its plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedDebtor {
    #[serde(flatten)]
    pub debtor: AggregatedDebtor,
    #[serde(flatten)]
    pub terms: NegotiationTerms,
}

/// Summarized row: every debtor once, annotated with its plans (if any).
///
/// Each negotiation attribute holds the distinct values across the
/// taxpayer's plans, joined with the configured separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedDebtor {
    #[serde(flatten)]
    pub debtor: AggregatedDebtor,
    pub has_plan: bool,
    pub negotiation_count: u64,
    #[serde(flatten)]
    pub terms: NegotiationTerms,
}
