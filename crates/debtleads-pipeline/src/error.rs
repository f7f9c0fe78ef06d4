use std::fmt;

use debtleads_core::ConfigError;
use thiserror::Error;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Filter,
    Aggregate,
    Plan,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Filter => "record filter",
            Stage::Aggregate => "aggregator",
            Stage::Plan => "plan matcher",
            Stage::Report => "report",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: required column `{column}` is missing")]
    Schema { stage: Stage, column: String },

    #[error("installment-plan input not found: {0}")]
    InputNotFound(String),

    #[error("{stage}: total for `{taxpayer_id}` exceeds the amount range")]
    Overflow { stage: Stage, taxpayer_id: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl PipelineError {
    pub(crate) fn missing(stage: Stage, column: impl Into<String>) -> Self {
        Self::Schema {
            stage,
            column: column.into(),
        }
    }

    /// The missing column, for schema errors.
    pub fn missing_column(&self) -> Option<&str> {
        match self {
            Self::Schema { column, .. } => Some(column),
            _ => None,
        }
    }
}
