use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use enrol_common::Flash;
use uuid::Uuid;

use crate::auth::{Session, SessionManager};
use crate::config::SessionSettings;
use crate::AppState;

#[derive(Debug, Default)]
struct HandleState {
    id: Option<String>,
    /// Session whose cookie the response must carry, with its Max-Age
    issued: Option<(String, i64)>,
}

/// The visitor's session for the current request.
///
/// Starts out holding the live session named by the cookie, if any. Nothing
/// is stored for a visitor until a flash or a login needs a session.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<HandleState>>,
}

impl SessionHandle {
    pub fn new(id: Option<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandleState { id, issued: None })),
        }
    }

    /// Id of the live session, if the visitor has one
    pub fn id(&self) -> Option<String> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).id.clone()
    }

    /// Queue `flash` for the next page, starting a session if needed
    pub async fn flash(&self, sessions: &SessionManager, flash: Flash) {
        if let Some(id) = self.id() {
            if sessions.push_flash(&id, flash.clone()).await {
                return;
            }
        }
        let session = sessions.create().await;
        sessions.push_flash(&session.id, flash).await;
        self.issue(&session);
    }

    /// Sign `user_id` in under a new session id
    pub async fn log_in(&self, sessions: &SessionManager, user_id: Uuid) {
        let previous = self.id();
        let session = sessions.log_in(previous.as_deref(), user_id).await;
        self.issue(&session);
    }

    fn issue(&self, session: &Session) {
        let max_age = (session.expires_at - session.created_at).num_seconds();
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.id = Some(session.id.clone());
        state.issued = Some((session.id.clone(), max_age));
    }

    fn take_issued(&self) -> Option<(String, i64)> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .issued
            .take()
    }
}

/// Attach a [`SessionHandle`] to every request.
///
/// Resolves the session named by the cookie and sets a new cookie when the
/// handler started or rotated a session.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = &state.settings.session;

    let presented = cookie_value(request.headers(), &settings.cookie_name).map(str::to_owned);
    let live = match presented {
        Some(id) => state.sessions.get(&id).await.map(|session| session.id),
        None => None,
    };

    let handle = SessionHandle::new(live);
    request.extensions_mut().insert(handle.clone());
    let mut response = next.run(request).await;

    if let Some((id, max_age)) = handle.take_issued() {
        match HeaderValue::from_str(&session_cookie(settings, &id, max_age)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            },
            Err(e) => tracing::error!(error = %e, "session cookie not representable"),
        }
    }
    response
}

/// Value of cookie `name` in the request headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn session_cookie(settings: &SessionSettings, id: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_name, id, max_age
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}
