// ============================
// enrol-backend-lib/src/router.rs
// ============================
//! HTTP routes.
use crate::handlers::{auth, public};
use crate::middleware::session_layer;
use crate::AppState;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(public::index))
        .route("/signup/", get(auth::signup_form).post(auth::signup_submit))
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/logout", get(auth::logout))
        .route("/confirm/{token}", get(auth::confirm))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        // Probes stay outside the session layer
        .route("/health", get(public::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
