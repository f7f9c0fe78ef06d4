use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use debtleads_source::{DelimitedOptions, read_many};
use tokio::sync::OnceCell;
use tracing::info;

use crate::ServiceError;

/// Provides the raw debt table every job runs against.
#[async_trait]
pub trait DebtSource: Send + Sync {
    async fn load(&self) -> Result<RecordBatch, ServiceError>;
}

/// Reads the configured debt files once, on a blocking thread, and keeps
/// the table for later jobs.
#[derive(Debug)]
pub struct FileDebtSource {
    paths: Vec<PathBuf>,
    options: DelimitedOptions,
    table: OnceCell<RecordBatch>,
}

impl FileDebtSource {
    pub fn new(paths: Vec<PathBuf>, options: DelimitedOptions) -> Self {
        Self {
            paths,
            options,
            table: OnceCell::new(),
        }
    }
}

#[async_trait]
impl DebtSource for FileDebtSource {
    async fn load(&self) -> Result<RecordBatch, ServiceError> {
        let table = self
            .table
            .get_or_try_init(|| async {
                let paths = self.paths.clone();
                let options = self.options.clone();
                let batch = tokio::task::spawn_blocking(move || read_many(&paths, &options))
                    .await??;
                info!(files = self.paths.len(), rows = batch.num_rows(), "loaded debt table");
                Ok::<_, ServiceError>(batch)
            })
            .await?;
        Ok(table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debtleads_source::SourceError;

    #[tokio::test]
    async fn missing_file_surfaces_source_error() {
        let source = FileDebtSource::new(
            vec![PathBuf::from("/nonexistent/debts.csv")],
            DelimitedOptions::default(),
        );
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ServiceError::Source(SourceError::NotFound(_))));
    }
}
