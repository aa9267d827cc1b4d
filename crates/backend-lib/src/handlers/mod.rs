//! HTTP handlers.

pub mod auth;
pub mod public;

use axum::response::Html;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::SessionHandle;
use crate::AppState;

/// Render `template` with `vars` plus the session's pending flashes.
///
/// Drains the flashes: each is shown exactly once.
pub(crate) async fn render_page(
    state: &AppState,
    session: &SessionHandle,
    template: &str,
    mut vars: Map<String, Value>,
) -> Result<Html<String>, AppError> {
    let flashes = match session.id() {
        Some(id) => state.sessions.take_flashes(&id).await,
        None => Vec::new(),
    };
    if !flashes.is_empty() {
        vars.insert("flashes".to_string(), serde_json::to_value(flashes)?);
    }
    Ok(Html(state.renderer.render(template, &vars)?))
}

/// Whether the session belongs to a signed-in user
pub(crate) async fn is_signed_in(state: &AppState, session: &SessionHandle) -> bool {
    signed_in_user(state, session).await.is_some()
}

/// User attached to the visitor's session
pub(crate) async fn signed_in_user(state: &AppState, session: &SessionHandle) -> Option<Uuid> {
    let id = session.id()?;
    state.sessions.get(&id).await.and_then(|s| s.user_id)
}
