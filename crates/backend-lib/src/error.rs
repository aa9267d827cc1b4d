// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::mail::MailError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Email {0} in use")]
    EmailUnavailable(String),

    #[error("Confirmation token expired")]
    TokenExpired,

    #[error("Invalid confirmation token")]
    InvalidToken,

    #[error("Confirmation token already used")]
    TokenAlreadyUsed,

    #[error("Error creating user: {0}")]
    RecordCreation(String),

    #[error("Failed to deliver email: {0}")]
    Delivery(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::EmailUnavailable(_) | AppError::TokenAlreadyUsed => StatusCode::CONFLICT,
            AppError::TokenExpired | AppError::InvalidToken | AppError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            },
            AppError::RecordCreation(_) => StatusCode::CONFLICT,
            AppError::Delivery(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::EmailUnavailable(_) => "SIGNUP_001",
            AppError::TokenExpired => "TOKEN_001",
            AppError::InvalidToken => "TOKEN_002",
            AppError::TokenAlreadyUsed => "TOKEN_003",
            AppError::RecordCreation(_) => "STORE_001",
            AppError::Delivery(_) => "MAIL_001",
            AppError::InvalidCredentials => "AUTH_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
            AppError::Store(_) => "STORE_002",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::EmailUnavailable(email) => format!("Email {email} in use"),
            AppError::TokenExpired => "The confirmation link has expired.".to_string(),
            AppError::InvalidToken => "Invalid confirmation token.".to_string(),
            AppError::TokenAlreadyUsed => {
                "This confirmation link has already been used.".to_string()
            },
            AppError::RecordCreation(_) => "Error creating user".to_string(),
            AppError::Delivery(_) => "Error sending confirmation email".to_string(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Internal(_) | AppError::Store(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }

    /// Whether the failure was caused by the visitor rather than the server
    pub fn is_user_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired { .. } => AppError::TokenExpired,
            TokenError::InvalidSignature => AppError::InvalidToken,
            TokenError::Encode(e) => AppError::Json(e),
            TokenError::Key => AppError::Internal("token signing key rejected".to_string()),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        match err {
            // The visitor typed an address the mail layer cannot use
            MailError::Address { .. } => AppError::InvalidInput(err.to_string()),
            MailError::Build(_) | MailError::Transport(_) => AppError::Delivery(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {err}"))
    }
}
