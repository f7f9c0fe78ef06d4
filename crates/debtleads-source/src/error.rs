use std::path::PathBuf;

use debtleads_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no files matching `{pattern}` in {}", .dir.display())]
    NoFiles { dir: PathBuf, pattern: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("cannot parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}
