//! Unified API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::container::ContainerError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad login credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Request without a live authorized token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The global session cap is reached. Distinct from the
    /// authorization failures.
    #[error("Too many active sessions")]
    CapacityExceeded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Container runtime could not create or start a container.
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    /// File delivery into the container failed.
    #[error("Upload failed: {0}")]
    Injection(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Provisioning(_) => StatusCode::BAD_GATEWAY,
            Self::Injection(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Provisioning(_) => "PROVISIONING_FAILED",
            Self::Injection(_) => "INJECTION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(msg) | ApiError::Provisioning(msg) => {
                error!(error_code = code, message = %msg, "API error");
            }
            ApiError::Injection(msg) => {
                warn!(error_code = code, message = %msg, "Upload failure");
            }
            _ => {
                debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Convert container errors to API errors.
impl From<ContainerError> for ApiError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::UnknownFlavor(_) => ApiError::BadRequest(err.to_string()),
            ContainerError::Provisioning(msg) => ApiError::Provisioning(msg),
            ContainerError::Injection(msg) => ApiError::Injection(msg),
            ContainerError::Stream(msg) => ApiError::Internal(msg),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
