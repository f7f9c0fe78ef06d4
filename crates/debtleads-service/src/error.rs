use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use debtleads_pipeline::PipelineError;
use debtleads_source::SourceError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} has not finished yet")]
    NotReady(String),

    #[error("job {id} failed: {message}")]
    JobFailed { id: String, message: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::NotReady(_) => (StatusCode::CONFLICT, "not_ready"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::JobFailed { .. }
            | Self::Pipeline(_)
            | Self::Source(_)
            | Self::Join(_)
            | Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = Json(json!({ "error": code, "message": self.to_string() }));
        (status, body).into_response()
    }
}
