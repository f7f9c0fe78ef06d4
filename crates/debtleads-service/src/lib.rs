//! HTTP job service: submit a run, poll its status, fetch its result.

mod app;
mod error;
mod source;
mod store;

pub use app::{AppState, router, serve};
pub use error::ServiceError;
pub use source::{DebtSource, FileDebtSource};
pub use store::{JobReport, JobState, JobStatus, JobStore, MemoryJobStore};
