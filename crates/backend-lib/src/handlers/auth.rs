// ============================
// enrol-backend-lib/src/handlers/auth.rs
// ============================
//! Signup, confirmation, login and logout pages.
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use enrol_common::{Flash, LoginForm, SignupForm};
use metrics::counter;
use serde_json::{Map, Value};

use super::{is_signed_in, render_page};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED};
use crate::middleware::SessionHandle;
use crate::render::{LOGIN_FORM, SIGNUP_FORM};
use crate::AppState;

fn signup_vars(form: Option<&SignupForm>, error: Option<&str>) -> Map<String, Value> {
    let mut vars = Map::new();
    if let Some(form) = form {
        vars.insert("email".into(), form.email.clone().into());
        vars.insert("name".into(), form.name.clone().into());
        vars.insert("surname".into(), form.surname.clone().into());
    }
    if let Some(error) = error {
        vars.insert("error".into(), error.into());
    }
    vars
}

/// `GET /signup/`
pub async fn signup_form(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    if is_signed_in(&state, &session).await {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(render_page(&state, &session, SIGNUP_FORM, signup_vars(None, None))
        .await?
        .into_response())
}

/// `POST /signup/`
pub async fn signup_submit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if is_signed_in(&state, &session).await {
        return Ok(Redirect::to("/").into_response());
    }

    let (status, message) = match state.registration.register(&form).await {
        Ok(issued) => {
            session
                .flash(
                    &state.sessions,
                    Flash::info(format!(
                        "A confirmation email has been sent to {}.",
                        issued.email
                    )),
                )
                .await;
            return Ok(Redirect::to("/").into_response());
        },
        Err(e @ AppError::EmailUnavailable(_)) => (e.status_code(), e.to_string()),
        Err(e @ AppError::Delivery(_)) => (e.status_code(), e.sanitized_message()),
        Err(e @ AppError::InvalidInput(_)) => {
            tracing::warn!(error = %e, "signup form rejected");
            (e.status_code(), e.to_string())
        },
        Err(e) => return Err(e),
    };

    let page = render_page(
        &state,
        &session,
        SIGNUP_FORM,
        signup_vars(Some(&form), Some(&message)),
    )
    .await?;
    Ok((status, page).into_response())
}

/// `GET /confirm/{token}`
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let (flash, target) = match state.confirmation.confirm(&token).await {
        Ok(user) => {
            session.log_in(&state.sessions, user.id).await;
            (
                Flash::info("Your email has been confirmed. Welcome!"),
                "/",
            )
        },
        Err(
            e @ (AppError::TokenExpired | AppError::InvalidToken | AppError::TokenAlreadyUsed),
        ) => (Flash::error(e.sanitized_message()), "/login"),
        Err(e @ AppError::RecordCreation(_)) => (Flash::error(e.to_string()), "/signup/"),
        Err(e) => return Err(e),
    };

    session.flash(&state.sessions, flash).await;
    Ok(Redirect::to(target).into_response())
}

/// `GET /login`
pub async fn login_form(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    if is_signed_in(&state, &session).await {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(render_page(&state, &session, LOGIN_FORM, Map::new())
        .await?
        .into_response())
}

/// `POST /login`
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if is_signed_in(&state, &session).await {
        return Ok(Redirect::to("/").into_response());
    }

    match state.auth.login(form.email.trim(), &form.password).await? {
        Some(user) => {
            counter!(LOGIN_SUCCEEDED).increment(1);
            tracing::info!(user_id = %user.id, "user logged in");
            session.log_in(&state.sessions, user.id).await;
            Ok(Redirect::to("/").into_response())
        },
        None => {
            counter!(LOGIN_FAILED).increment(1);
            tracing::warn!(email = %form.email, "login failed");
            let mut vars = Map::new();
            vars.insert("email".into(), form.email.into());
            vars.insert("error".into(), AppError::InvalidCredentials.to_string().into());
            let page = render_page(&state, &session, LOGIN_FORM, vars).await?;
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        },
    }
}

/// `GET /logout`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Redirect {
    let Some(id) = session.id() else {
        return Redirect::to("/");
    };
    if state.sessions.log_out(&id).await {
        session
            .flash(&state.sessions, Flash::info("You have been logged out."))
            .await;
    }
    Redirect::to("/")
}
