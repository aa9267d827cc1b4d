//! Error to HTTP response mapping

use axum::http::StatusCode;
use axum::response::IntoResponse;
use enrol_backend_lib::{error::AppError, mail::MailError, store::StoreError};

#[tokio::test]
async fn test_error_codes_in_response_body() {
    let cases = [
        (AppError::TokenExpired, StatusCode::BAD_REQUEST, "TOKEN_001"),
        (AppError::InvalidToken, StatusCode::BAD_REQUEST, "TOKEN_002"),
        (AppError::TokenAlreadyUsed, StatusCode::CONFLICT, "TOKEN_003"),
        (
            AppError::EmailUnavailable("a@x.com".to_string()),
            StatusCode::CONFLICT,
            "SIGNUP_001",
        ),
        (
            AppError::Internal("boom".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "INT_001",
        ),
    ];

    for (error, status, code) in cases {
        let response = error.into_response();
        assert_eq!(response.status(), status);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], code);
    }
}

#[test]
fn test_collaborator_errors_convert() {
    let mail: AppError = MailError::Transport("timeout".to_string()).into();
    assert!(matches!(mail, AppError::Delivery(_)));
    assert_eq!(mail.status_code(), StatusCode::BAD_GATEWAY);

    let store: AppError = StoreError::DuplicateEmail("a@x.com".to_string()).into();
    assert_eq!(store.error_code(), "STORE_002");
    assert!(!store.is_user_error());
}
