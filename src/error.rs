//! Error type shared by every API handler and the single place where errors
//! are turned into HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::tmdb::UpstreamError;

pub const MISSING_CREDENTIAL_HINT: &str = "Create backend/.env and set TMDB_API_KEY=...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    InvalidInput,
    Upstream,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("TMDB_API_KEY missing")]
    MissingCredential,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("TMDB request failed: {status}")]
    Upstream { status: u16, detail: Value },
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::MissingCredential => ErrorKind::MissingCredential,
            ApiError::InvalidInput(_) => ErrorKind::InvalidInput,
            ApiError::Upstream { .. } => ErrorKind::Upstream,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::MissingCredential => ApiError::MissingCredential,
            UpstreamError::Status { status, detail } => ApiError::Upstream { status, detail },
            UpstreamError::Transport(message) => {
                // Socket and host details go to the log, never to the client.
                tracing::warn!(error = %message, "TMDB transport failure");
                ApiError::Internal("TMDB request failed".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ApiError::Upstream { detail, .. } => {
                tracing::warn!(status = %status, detail = %detail, "upstream error")
            }
            _ if status.is_server_error() => {
                tracing::error!(status = %status, error = %self, "server error in API handler")
            }
            _ => {}
        }

        let body = match &self {
            ApiError::MissingCredential => json!({
                "error": self.to_string(),
                "hint": MISSING_CREDENTIAL_HINT,
                "status": status.as_u16(),
            }),
            ApiError::InvalidInput(message) => json!({ "error": message }),
            _ => json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_produces_400() {
        let err = ApiError::InvalidInput("Invalid id");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_status_is_propagated() {
        let err = ApiError::from(UpstreamError::Status {
            status: 404,
            detail: json!({ "status_message": "not found" }),
        });
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.to_string(), "TMDB request failed: 404");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bogus_upstream_status_falls_back_to_500() {
        let err = ApiError::Upstream {
            status: 42,
            detail: Value::Null,
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_credential_is_500() {
        let err = ApiError::from(UpstreamError::MissingCredential);
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transport_failures_are_internal() {
        let err = ApiError::from(UpstreamError::Transport("connection refused".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn transport_details_stay_out_of_the_response() {
        use http_body_util::BodyExt;

        let err = ApiError::from(UpstreamError::Transport(
            "Connection Failed: Connect error: connection refused (os error 111) 10.0.0.7:443".into(),
        ));
        assert_eq!(err.to_string(), "TMDB request failed");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "TMDB request failed", "status": 500 }));
    }
}
