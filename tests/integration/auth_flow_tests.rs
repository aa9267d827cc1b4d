//! Login, logout and session cookie behaviour

use crate::test_utils::{
    assert_redirect, body_string, session_cookie, setup_test_app, setup_test_app_with,
    test_settings, TestApp,
};
use axum::http::{header, StatusCode};
use enrol_backend_lib::{
    clock::ManualClock,
    mail::MemoryMailer,
    router::create_router,
    store::{FlatFileUserStore, MemoryUserStore, UserStore},
    AppState,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Register and confirm `email` from a throwaway browser
async fn registered(app: &TestApp, email: &str, password: &str) {
    let (response, _) = app.signup(email, password).await;
    assert_redirect(&response, "/");
    let token = app.confirmation_token(email).unwrap();
    assert_redirect(&app.browser().get(&format!("/confirm/{token}")).await, "/");
}

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let app = setup_test_app();
    registered(&app, "a@x.com", "pw").await;

    let mut browser = app.browser();
    let response = browser.login("A@X.com", "pw").await;

    assert_redirect(&response, "/");
    assert!(browser.is_signed_in().await);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = setup_test_app();
    registered(&app, "a@x.com", "pw").await;

    let mut browser = app.browser();
    let response = browser.login("a@x.com", "nope").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_string(response).await.contains("Invalid credentials"));
    assert!(!browser.is_signed_in().await);
}

#[tokio::test]
async fn test_login_for_unconfirmed_signup_fails() {
    let app = setup_test_app();
    let (response, _) = app.signup("a@x.com", "pw").await;
    assert_redirect(&response, "/");

    let response = app.browser().login("a@x.com", "pw").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rotates_session_id() {
    let app = setup_test_app();
    registered(&app, "a@x.com", "pw").await;

    // An anonymous session planted before login
    let mut browser = app.browser();
    browser.get("/confirm/garbage").await;
    let planted = browser.cookie().unwrap().to_string();

    browser.login("a@x.com", "pw").await;
    let signed_in = browser.cookie().unwrap().to_string();

    assert_ne!(planted, signed_in);
    assert!(browser.is_signed_in().await);
    assert!(!app.is_signed_in(&planted).await);
    assert!(app
        .get("/", Some(&planted))
        .await
        .headers()
        .get(header::SET_COOKIE)
        .is_none());
}

#[tokio::test]
async fn test_confirmation_rotates_session_id() {
    let app = setup_test_app();
    let (_, mut browser) = app.signup("a@x.com", "pw").await;
    let before = browser.cookie().unwrap().to_string();

    let token = app.confirmation_token("a@x.com").unwrap();
    browser.get(&format!("/confirm/{token}")).await;

    assert_ne!(browser.cookie().unwrap(), before);
    assert!(browser.is_signed_in().await);
    assert!(!app.is_signed_in(&before).await);
}

#[tokio::test]
async fn test_logout_ends_the_session_login() {
    let app = setup_test_app();
    registered(&app, "a@x.com", "pw").await;

    let mut browser = app.browser();
    browser.login("a@x.com", "pw").await;
    assert!(browser.is_signed_in().await);

    assert_redirect(&browser.get("/logout").await, "/");
    assert!(!browser.is_signed_in().await);

    let index = body_string(browser.get("/").await).await;
    assert!(index.contains("You have been logged out."));
    assert!(!index.contains("Signed in as"));
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let mut settings = test_settings();
    settings.session.secure_cookie = true;
    let app = setup_test_app_with(settings);
    registered(&app, "a@x.com", "pw").await;

    let response = app.browser().login("a@x.com", "pw").await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    assert!(set_cookie.starts_with("enrol_session="));
    assert!(set_cookie.contains("; Path=/"));
    assert!(set_cookie.contains("; HttpOnly"));
    assert!(set_cookie.contains("; SameSite=Lax"));
    assert!(set_cookie.contains("; Max-Age=604800"));
    assert!(set_cookie.ends_with("; Secure"));

    // A live session is reused without a new cookie
    let cookie = session_cookie(&response).unwrap();
    let again = app.get("/", Some(&cookie)).await;
    assert!(again.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_flash_only_session_is_short_lived() {
    let app = setup_test_app();

    let response = app.get("/confirm/garbage", None).await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("; Max-Age=1800"));
}

#[tokio::test]
async fn test_cookieless_requests_do_not_accumulate_sessions() {
    let mut settings = test_settings();
    settings.session.max_anonymous = 10;
    let app = setup_test_app_with(settings);

    for _ in 0..500 {
        let response = app.get("/", None).await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
    assert!(app.state.sessions.is_empty().await);

    for _ in 0..500 {
        app.get("/confirm/garbage", None).await;
    }
    assert_eq!(app.state.sessions.len().await, 10);
}

#[tokio::test]
async fn test_expired_session_is_not_revived() {
    let app = setup_test_app();
    registered(&app, "a@x.com", "pw").await;
    let mut browser = app.browser();
    browser.login("a@x.com", "pw").await;
    let cookie = browser.cookie().unwrap().to_string();

    app.clock.advance_secs(60 * 60 * 24 * 7 + 1);
    let response = app.get("/", Some(&cookie)).await;
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(!app.is_signed_in(&cookie).await);
    assert!(!body_string(response).await.contains("Signed in as"));
}

#[tokio::test]
async fn test_health_is_outside_sessions() {
    let app = setup_test_app();
    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_string(response).await, "OK");
    assert!(app.state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_flow_against_flat_file_store() {
    let temp_dir = TempDir::new().unwrap();
    let users = Arc::new(FlatFileUserStore::new(temp_dir.path()).unwrap());
    let mailer = Arc::new(MemoryMailer::new());
    let state = Arc::new(AppState::new(
        test_settings(),
        users.clone(),
        mailer.clone(),
        Arc::new(ManualClock::default()),
    ));
    let app = TestApp {
        router: create_router(state.clone()),
        state,
        mailer,
        // Records live in the flat-file store, not in this one
        users: Arc::new(MemoryUserStore::new()),
        clock: Arc::new(ManualClock::default()),
    };

    registered(&app, "a@x.com", "pw").await;

    // Records survive a reopen of the data directory
    let reopened = FlatFileUserStore::new(temp_dir.path()).unwrap();
    let user = reopened
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "A");
}
