//! End-to-end signup and confirmation over HTTP

use crate::test_utils::{assert_redirect, body_string, setup_test_app, TestApp};
use axum::http::StatusCode;
use enrol_backend_lib::auth::verify_password;
use enrol_backend_lib::store::UserStore;

/// Sign up `email` and return the confirmation token from the outbox
async fn signup_token(app: &TestApp, email: &str) -> String {
    let (response, _) = app.signup(email, "pw").await;
    assert_redirect(&response, "/");
    app.confirmation_token(email).expect("confirmation email sent")
}

#[tokio::test]
async fn test_signup_then_confirm_creates_user_and_signs_in() {
    let app = setup_test_app();
    let (response, mut signup_browser) = app.signup("a@x.com", "pw").await;
    assert_redirect(&response, "/");

    // Nothing is stored before the link is visited
    assert!(app.users.is_empty());
    let mail = app.mailer.last_to("a@x.com").unwrap();
    assert_eq!(mail.subject, "Confirm Your Email");
    assert!(mail
        .body
        .starts_with("Please click the following link to verify your email: http://enrol.test/confirm/"));

    let index = body_string(signup_browser.get("/").await).await;
    assert!(index.contains("A confirmation email has been sent to a@x.com."));

    let token = app.confirmation_token("a@x.com").unwrap();
    let mut browser = app.browser();
    let response = browser.get(&format!("/confirm/{token}")).await;
    assert_redirect(&response, "/");

    let user = app.users.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(user.name, "A");
    assert_eq!(user.surname, "B");
    assert!(verify_password(&user.password_hash, "pw"));
    assert!(browser.is_signed_in().await);

    let index = body_string(browser.get("/").await).await;
    assert!(index.contains("Signed in as a@x.com"));
    assert!(index.contains("Your email has been confirmed."));
}

#[tokio::test]
async fn test_confirm_within_max_age_succeeds() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;

    app.clock.advance_secs(3600);
    let response = app.browser().get(&format!("/confirm/{token}")).await;

    assert_redirect(&response, "/");
    assert_eq!(app.users.len(), 1);
}

#[tokio::test]
async fn test_confirm_after_max_age_is_expired() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;

    app.clock.advance_secs(3601);
    let mut browser = app.browser();
    let response = browser.get(&format!("/confirm/{token}")).await;

    assert_redirect(&response, "/login");
    assert!(app.users.is_empty());
    assert!(!browser.is_signed_in().await);

    let page = body_string(browser.get("/login").await).await;
    assert!(page.contains("The confirmation link has expired."));
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;

    let signature_start = token.rfind('.').unwrap() + 1;
    let mut tampered = token.clone();
    let replacement = if token[signature_start..].starts_with('A') { "B" } else { "A" };
    tampered.replace_range(signature_start..signature_start + 1, replacement);

    let mut browser = app.browser();
    let response = browser.get(&format!("/confirm/{tampered}")).await;
    assert_redirect(&response, "/login");
    assert!(app.users.is_empty());

    let page = body_string(browser.get("/login").await).await;
    assert!(page.contains("Invalid confirmation token."));
}

#[tokio::test]
async fn test_token_cannot_be_replayed() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;
    let path = format!("/confirm/{token}");

    let mut first = app.browser();
    assert_redirect(&first.get(&path).await, "/");

    let mut second = app.browser();
    assert_redirect(&second.get(&path).await, "/login");
    assert_eq!(app.users.len(), 1);
    assert!(!second.is_signed_in().await);

    let page = body_string(second.get("/login").await).await;
    assert!(page.contains("This confirmation link has already been used."));
}

#[tokio::test]
async fn test_signup_for_registered_email_sends_nothing() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;
    app.browser().get(&format!("/confirm/{token}")).await;
    let sent_before = app.mailer.sent().len();

    let (response, _) = app.signup("a@x.com", "other").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_string(response).await.contains("Email a@x.com in use"));

    assert_eq!(app.mailer.sent().len(), sent_before);
    assert_eq!(app.users.len(), 1);
}

#[tokio::test]
async fn test_display_name_form_cannot_register_a_second_account() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;
    app.browser().get(&format!("/confirm/{token}")).await;
    let sent_before = app.mailer.sent().len();

    let (response, _) = app.signup("Bob <a@x.com>", "pw").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.mailer.sent().len(), sent_before);
    assert_eq!(app.users.len(), 1);
}

#[tokio::test]
async fn test_malformed_address_is_invalid_input() {
    let app = setup_test_app();

    let (response, _) = app.signup("foo@", "pw").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("value=\"foo@\""));
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_second_pending_signup_for_same_email_fails_on_confirm() {
    let app = setup_test_app();
    let first = signup_token(&app, "a@x.com").await;
    app.clock.advance_secs(5);
    let second = signup_token(&app, "a@x.com").await;
    assert_ne!(first, second);

    assert_redirect(&app.browser().get(&format!("/confirm/{first}")).await, "/");

    let mut other = app.browser();
    let response = other.get(&format!("/confirm/{second}")).await;
    assert_redirect(&response, "/signup/");
    assert_eq!(app.users.len(), 1);

    let page = body_string(other.get("/signup/").await).await;
    assert!(page.contains("Error creating user:"));
}

#[tokio::test]
async fn test_mail_failure_renders_form_error() {
    let app = setup_test_app();
    app.mailer.fail_with("connection refused");

    let (response, _) = app.signup("a@x.com", "pw").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let page = body_string(response).await;
    assert!(page.contains("Error sending confirmation email"));
    assert!(!page.contains("connection refused"));
    assert!(app.users.is_empty());
}

#[tokio::test]
async fn test_incomplete_signup_form_is_rejected() {
    let app = setup_test_app();

    let response = app
        .browser()
        .post_form("/signup/", &[("email", "a@x.com")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("value=\"a@x.com\""));
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_signed_in_user_is_redirected_away_from_signup() {
    let app = setup_test_app();
    let token = signup_token(&app, "a@x.com").await;
    let mut browser = app.browser();
    browser.get(&format!("/confirm/{token}")).await;

    assert_redirect(&browser.get("/signup/").await, "/");
    assert_redirect(&browser.get("/login").await, "/");
}
