//! Unified application error model and mapping helpers.
//! Every request path ends in either a successful response or one of these
//! errors; `IntoResponse` turns them into plain-text HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::ident::IdentError;
use crate::storage::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    InvalidIdentifier { code: String, message: String },
    InvalidContent { code: String, message: String },
    NotFound { code: String, message: String },
    MethodNotAllowed { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::InvalidIdentifier { code, .. }
            | AppError::InvalidContent { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::MethodNotAllowed { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::InvalidIdentifier { message, .. }
            | AppError::InvalidContent { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::MethodNotAllowed { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn invalid_identifier<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::InvalidIdentifier { code: code.into(), message: msg.into() } }
    pub fn invalid_content<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::InvalidContent { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn method_not_allowed<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::MethodNotAllowed { code: code.into(), message: msg.into() } }
    pub fn unavailable<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidIdentifier { .. } => 400,
            AppError::InvalidContent { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::MethodNotAllowed { .. } => 405,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<IdentError> for AppError {
    fn from(err: IdentError) -> Self {
        match err {
            IdentError::InvalidIdentifier(msg) => AppError::invalid_identifier("invalid_identifier", msg),
            // Keys built from request parameters never go through decode; reaching this is a bug.
            IdentError::MalformedKey(key) => AppError::internal("malformed_key", format!("malformed key {}", key)),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::unavailable("backend_unavailable", format!("Backend unavailable: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(code = self.code_str(), "request failed: {}", self.message());
        }
        (status, self.message().to_string()).into_response()
    }
}
