//! Error responses for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::documents::StoreError;

/// Errors returned by route handlers, rendered as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::InvalidPath(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(target: "http", "request failed: {self}");
        } else {
            crate::debug_event!("http", "rejected", "{status}: {self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(StoreError::NotFound { what: "x".into() });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = ApiError::from(StoreError::InvalidPath("../x".into()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let io = ApiError::from(StoreError::Io(std::io::Error::other("disk")));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            ApiError::BadRequest("q".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
