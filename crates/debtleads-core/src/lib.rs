pub mod amount;
pub mod config;
mod error;
pub mod record;
pub mod schema;

pub use amount::Amount;
pub use config::{
    ColumnMap, FilterConfig, MatchStrategy, PlanColumns, PlanConfig, ServiceConfig, Settings,
    SourceFormat, TextEncoding,
};
pub use error::ConfigError;
pub use record::{
    AggregatedDebtor, AnnotatedDebtor, InstallmentPlanRecord, MatchedDebtor, NegotiationTerms,
};
pub use schema::{debt, plan};
