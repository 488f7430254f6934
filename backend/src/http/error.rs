//! HTTP error payloads for pipeline and handler failures.
//!
//! Every failure the pipeline surfaces, whether raised by a guard stage or a
//! handler, is expressed as an [`ApiError`] so clients receive one envelope
//! shape and the error funnel sees one type.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::ports::DirectoryError;

/// Stable machine-readable code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request body exceeded the configured byte limit.
    PayloadTooLarge,
    /// Request body carried more parameters than allowed.
    TooManyParameters,
    /// Request body could not be parsed under its declared content type.
    MalformedBody,
    /// The association lookup could not be refreshed.
    LookupUnavailable,
    /// Anything the server cannot blame on the client.
    InternalError,
}

/// Standard error envelope returned by the pipeline and handlers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Body byte limit exceeded.
    pub fn payload_too_large(limit: usize) -> Self {
        Self {
            code: ErrorCode::PayloadTooLarge,
            message: format!("request body exceeds the {limit} byte limit"),
        }
    }

    /// Body parameter count exceeded.
    pub fn too_many_parameters(limit: usize) -> Self {
        Self {
            code: ErrorCode::TooManyParameters,
            message: format!("request body exceeds the {limit} parameter limit"),
        }
    }

    /// Body failed to parse under its declared content type.
    pub fn malformed_body(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::MalformedBody,
            message: format!("request body is malformed: {}", detail.into()),
        }
    }

    /// The lookup refresh failed and the request cannot proceed.
    pub fn lookup_unavailable(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::LookupUnavailable,
            message: format!("association lookup unavailable: {}", detail.into()),
        }
    }

    /// Server-side failure. The detail is logged, never sent to clients.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: detail.into(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    fn to_status_code(&self) -> StatusCode {
        match self.code {
            ErrorCode::PayloadTooLarge | ErrorCode::TooManyParameters => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ErrorCode::MalformedBody => StatusCode::BAD_REQUEST,
            ErrorCode::LookupUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        ApiError::lookup_unavailable(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.to_status_code()
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self.code, ErrorCode::InternalError) {
            let mut redacted = self.clone();
            redacted.message = "Internal server error".to_string();
            return HttpResponse::build(self.status_code()).json(redacted);
        }
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Convenience alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;
