use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docgate_store::StoreError;
use docgate_types::TypeError;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid document path {0:?}: expected /{{datatype}}/{{id}}")]
    BadPath(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{} bulk item(s) rejected", failed.len())]
    BulkItems { failed: Vec<usize>, written: usize },

    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::BadPath(_) | Self::BulkItems { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Backend(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backend(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TypeError> for ServerError {
    fn from(e: TypeError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = match &self {
            Self::BulkItems { failed, written } => json!({
                "error": self.to_string(),
                "failed_items": failed,
                "written": written,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
