use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    response::Html,
};
use serde_json::{json, Map};

use super::{render_page, signed_in_user};
use crate::error::AppError;
use crate::middleware::SessionHandle;
use crate::render::INDEX;
use crate::AppState;

/// `GET /`
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Html<String>, AppError> {
    let mut vars = Map::new();

    if let Some(id) = signed_in_user(&state, &session).await {
        match state.auth.get_user(id).await? {
            Some(user) => {
                vars.insert(
                    "user".to_string(),
                    json!({"email": user.email, "name": user.name, "surname": user.surname}),
                );
            },
            None => {
                // Record vanished under a live session
                tracing::warn!(user_id = %id, "session refers to unknown user");
                if let Some(session_id) = session.id() {
                    state.sessions.log_out(&session_id).await;
                }
            },
        }
    }

    render_page(&state, &session, INDEX, vars).await
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}
