// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Admission, precondition and business errors are raised before any write.
//! Gateway and database errors may surface after a commit has already
//! happened (for example from a payment trigger).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity token does not belong to the requested user")]
    IdentityMismatch,

    #[error("User did not have a valid {0}")]
    IncompleteProfile(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Data action ({0}) does not exist")]
    UnsupportedAction(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Identity service error: {0}")]
    Identity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::IdentityMismatch => "identity_mismatch",
            AppError::IncompleteProfile(_) => "incomplete_profile",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::UnsupportedAction(_) => "unsupported_action",
            AppError::BadRequest(_) => "bad_request",
            AppError::Gateway(_) => "gateway_error",
            AppError::Identity(_) => "identity_unavailable",
            AppError::Database(_) => "database_error",
            AppError::Serialization(_) | AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::IdentityMismatch | AppError::IncompleteProfile(_) | AppError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnsupportedAction(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Identity(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = match &self {
            AppError::Unauthorized | AppError::InvalidToken | AppError::IdentityMismatch => None,
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                None
            }
            AppError::Serialization(err) => {
                tracing::error!(error = %err, "Serialization error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            AppError::Gateway(msg) => {
                tracing::error!(error = %msg, "Payment gateway error");
                Some(msg.clone())
            }
            AppError::Identity(msg) => {
                tracing::error!(error = %msg, "Identity service error");
                None
            }
            other => Some(other.to_string()),
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
