//! Custom error types for translation operations

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Provider answered with a non-success status
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status returned by the provider
        status: u16,
        /// Raw provider error body
        message: String,
    },

    /// Provider rejected the credential
    #[error("Authentication failed: {message}")]
    AuthenticationError {
        /// Raw provider error body
        message: String,
    },

    /// Network error
    #[error("Network error: {message}")]
    NetworkError {
        /// Transport error description
        message: String,
    },

    /// Invalid response from API
    #[error("Invalid response: {message}")]
    InvalidResponseError {
        /// What was wrong with the body
        message: String,
    },

    /// Request timeout
    #[error("Request timeout")]
    TimeoutError,

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is misconfigured
        message: String,
    },

    /// Prompt placeholder without a bound value
    #[error("Missing template variable: {name}")]
    MissingVariable {
        /// Placeholder name
        name: String,
    },

    /// A chain stage received a value of the wrong kind
    #[error("Stage '{stage}' expected {expected}, got {found}")]
    StageInput {
        /// Stage name
        stage: String,
        /// Kind the stage accepts
        expected: &'static str,
        /// Kind it was given
        found: &'static str,
    },
}

impl From<reqwest::Error> for TranslationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranslationError::TimeoutError
        } else {
            TranslationError::NetworkError {
                message: err.to_string(),
            }
        }
    }
}

impl TranslationError {
    /// HTTP status reported to callers of the service
    pub fn status_code(&self) -> StatusCode {
        match self {
            TranslationError::NetworkError { .. } => StatusCode::BAD_GATEWAY,
            TranslationError::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TranslationError::ApiError { .. } => "provider_error",
            TranslationError::AuthenticationError { .. } => "authentication_error",
            TranslationError::NetworkError { .. } => "network_error",
            TranslationError::InvalidResponseError { .. } => "invalid_response",
            TranslationError::TimeoutError => "timeout",
            TranslationError::ConfigError { .. } => "config_error",
            TranslationError::MissingVariable { .. } => "missing_variable",
            TranslationError::StageInput { .. } => "stage_input",
        }
    }
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorDetail,
}

/// Error payload body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Human readable message
    pub message: String,
    /// Machine readable code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error class
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

impl ErrorResponse {
    /// Build an envelope from its parts
    pub fn new(message: impl Into<String>, code: &str, kind: &str) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                code: Some(code.to_string()),
                r#type: Some(kind.to_string()),
            },
        }
    }
}

impl IntoResponse for TranslationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(self.to_string(), self.code(), "api_error");
        (status, axum::Json(body)).into_response()
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TranslationError::NetworkError {
                message: "refused".to_string()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            TranslationError::TimeoutError.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            TranslationError::AuthenticationError {
                message: "bad key".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_envelope_skips_missing_fields() {
        let body = ErrorResponse {
            error: ErrorDetail {
                message: "boom".to_string(),
                code: None,
                r#type: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": { "message": "boom" } }));
    }
}
