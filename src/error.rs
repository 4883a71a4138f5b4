use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::observability::ports::ProviderError;
use crate::observability::query_parser::ParseError;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Missing or malformed request argument
    InvalidArgument(String),
    /// Query text could not be parsed
    Parse(ParseError),
    /// No registered client for the requested kind + name
    ProviderNotFound { kind: &'static str, name: String },
    /// Trace id unknown to the provider
    TraceNotFound(String),
    /// Reserved data source without an implementation
    NotImplemented(String),
    /// Provider returned a non-2xx or the HTTP exchange failed
    Upstream { source: &'static str, message: String },
    /// Provider call exceeded its deadline
    UpstreamTimeout { source: &'static str, message: String },
    /// Authentication error
    Unauthorized(String),
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Parse(err) => write!(f, "failed to parse query: {}", err),
            Self::ProviderNotFound { kind, name } => {
                write!(f, "{} provider not found: {}", kind, name)
            }
            Self::TraceNotFound(id) => write!(f, "trace not found: {}", id),
            Self::NotImplemented(msg) => write!(f, "{}", msg),
            Self::Upstream { source, message } => write!(f, "{} query failed: {}", source, message),
            Self::UpstreamTimeout { source, message } => {
                write!(f, "{} query timed out: {}", source, message)
            }
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Convert a provider failure, keeping the data-source tag in the message
    pub fn upstream(source: &'static str, err: ProviderError) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout {
                source,
                message: err.to_string(),
            }
        } else {
            Self::Upstream {
                source,
                message: err.to_string(),
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::TraceNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Pair the error with the empty data shell of the endpoint that failed
    pub fn with_data<T: Serialize>(self, data: T) -> ErrorResponse<T> {
        ErrorResponse { error: self, data }
    }
}

/// Error body carrying an endpoint-specific `data` shell
#[derive(Debug)]
pub struct ErrorResponse<T> {
    pub error: AppError,
    pub data: T,
}

impl<T: Serialize> IntoResponse for ErrorResponse<T> {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        // Single line, always
        let message = self.error.to_string().replace(['\r', '\n'], " ");

        let body = Json(json!({
            "success": false,
            "error": message,
            "data": self.data,
        }));

        (status, body).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.with_data(json!({})).into_response()
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::ProviderNotFound {
            kind: "logs",
            name: "nope".to_string(),
        };
        assert_eq!(error.to_string(), "logs provider not found: nope");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidArgument("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Parse(ParseError::Empty).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::NotImplemented("x".into()).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            AppError::UpstreamTimeout {
                source: "traces",
                message: "x".into()
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_upstream_classifies_timeouts() {
        let err = ProviderError::Timeout {
            vendor: "loki",
            message: "deadline elapsed".to_string(),
        };
        assert!(matches!(
            AppError::upstream("logs", err),
            AppError::UpstreamTimeout { source: "logs", .. }
        ));

        let err = ProviderError::Upstream {
            vendor: "loki",
            status: 400,
            message: "parse error".to_string(),
        };
        let app_err = AppError::upstream("logs", err);
        assert_eq!(app_err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(app_err.to_string().contains("loki error: 400: parse error"));
    }

    #[tokio::test]
    async fn test_error_response_envelope() {
        let response = AppError::Unauthorized("Invalid API key".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unauthorized: Invalid API key");
    }
}
