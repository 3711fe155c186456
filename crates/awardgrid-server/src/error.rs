//! API error type with HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Client-visible request failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required request field is absent or empty
    #[error("{0}")]
    MissingParameter(String),

    /// A request field is present but unusable
    #[error("{0}")]
    InvalidParameter(String),

    /// The pool and producers have not been initialized yet
    #[error("Browser automation not initialized")]
    NotReady,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingParameter(_) | Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = ApiError::MissingParameter("origin is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::NotReady.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
