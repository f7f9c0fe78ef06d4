//! Debt-lead pipeline: record filter → aggregator → installment-plan matcher.
//!
//! Every stage is a pure, synchronous transform over an in-memory Arrow
//! table or typed rows. I/O lives in `debtleads-source`.

pub mod aggregate;
mod error;
pub mod filter;
pub mod matcher;
mod pipeline;
pub mod plan;
pub mod report;
mod table;

pub use aggregate::aggregate;
pub use error::{PipelineError, Stage};
pub use filter::{FilterStats, RecordFilter};
pub use matcher::{MatchOutcome, PlanMatcher};
pub use pipeline::{Pipeline, PipelineOutput};
pub use plan::collect_plans;
