//! Source I/O: delimited-text readers, plan-file discovery, report export.

mod delimited;
mod discover;
mod error;
mod export;

pub use delimited::{DelimitedOptions, parse_delimited, read_delimited, read_many, union_batches};
pub use discover::discover_plan_files;
pub use error::SourceError;
pub use export::{ReportFormat, ReportWriter, write_csv, write_json};
