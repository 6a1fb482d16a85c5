use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use libris_shared::QueryError;
use libris_store::StoreError;

use crate::blob_store::BlobError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("Upload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Record not found".into()),
            other => ServerError::Store(other),
        }
    }
}

impl From<BlobError> for ServerError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::NotFound(key) => ServerError::NotFound(format!("Blob {key} is missing")),
            BlobError::TooLarge { size, max } => ServerError::PayloadTooLarge { size, max },
            BlobError::InvalidKey(key) => ServerError::BadRequest(format!("Invalid blob key: {key}")),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Query(e) => (StatusCode::BAD_REQUEST, e.warning().to_string()),
            ServerError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Blob storage error".to_string())
            }
            ServerError::Store(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
