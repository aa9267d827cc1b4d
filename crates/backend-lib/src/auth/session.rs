// ============================
// enrol-backend-lib/src/auth/session.rs
// ============================
//! Browser sessions: who is signed in plus pending flash messages.
use chrono::{DateTime, Utc};
use enrol_common::Flash;
use metrics::{counter, gauge};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::token_generator::generate_session_id;
use crate::clock::Clock;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EVICTED, SESSION_EXPIRED};

/// Session information
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// Signed-in user, if any
    pub user_id: Option<Uuid>,
    pub flashes: Vec<Flash>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// In-memory session store keyed by the cookie value.
///
/// Sessions start anonymous with a short lifetime and are capped in number;
/// signing in moves the visitor to a fresh id with the full lifetime.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: chrono::Duration,
    anonymous_ttl: chrono::Duration,
    max_anonymous: usize,
    clock: Arc<dyn Clock>,
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

impl SessionManager {
    pub fn new(
        ttl: Duration,
        anonymous_ttl: Duration,
        max_anonymous: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SessionManager {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: to_chrono(ttl),
            anonymous_ttl: to_chrono(anonymous_ttl),
            max_anonymous: max_anonymous.max(1),
            clock,
        }
    }

    fn expiry(now: DateTime<Utc>, ttl: chrono::Duration) -> DateTime<Utc> {
        now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Create an anonymous session, evicting the oldest anonymous one when
    /// the cap is reached
    pub async fn create(&self) -> Session {
        let now = self.clock.now();
        let session = Session {
            id: generate_session_id(),
            user_id: None,
            flashes: Vec::new(),
            created_at: now,
            expires_at: Self::expiry(now, self.anonymous_ttl),
        };

        let mut sessions = self.sessions.write().await;
        let anonymous = sessions.values().filter(|s| !s.is_authenticated()).count();
        if anonymous >= self.max_anonymous {
            sessions.retain(|_, s| s.is_authenticated() || now < s.expires_at);
            let anonymous = sessions.values().filter(|s| !s.is_authenticated()).count();
            if anonymous >= self.max_anonymous {
                let oldest = sessions
                    .values()
                    .filter(|s| !s.is_authenticated())
                    .min_by_key(|s| s.created_at)
                    .map(|s| s.id.clone());
                if let Some(oldest) = oldest {
                    sessions.remove(&oldest);
                    counter!(SESSION_EVICTED).increment(1);
                }
            }
        }
        sessions.insert(session.id.clone(), session.clone());

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        session
    }

    /// Get a live session by id
    pub async fn get(&self, id: &str) -> Option<Session> {
        let now = self.clock.now();
        let sessions = self.sessions.read().await;
        sessions.get(id).filter(|s| now < s.expires_at).cloned()
    }

    /// Sign `user_id` in under a freshly generated session id.
    ///
    /// The `previous` session, if still live, is removed and its pending
    /// flashes move to the new session.
    pub async fn log_in(&self, previous: Option<&str>, user_id: Uuid) -> Session {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let flashes = previous
            .and_then(|id| sessions.remove(id))
            .filter(|s| now < s.expires_at)
            .map(|s| s.flashes)
            .unwrap_or_default();
        let session = Session {
            id: generate_session_id(),
            user_id: Some(user_id),
            flashes,
            created_at: now,
            expires_at: Self::expiry(now, self.ttl),
        };
        sessions.insert(session.id.clone(), session.clone());

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        session
    }

    /// Detach the signed-in user, keeping pending flashes.
    ///
    /// The session falls back to the anonymous lifetime.
    pub async fn log_out(&self, id: &str) -> bool {
        let cutoff = Self::expiry(self.clock.now(), self.anonymous_ttl);
        self.update(id, |session| {
            session.user_id = None;
            session.expires_at = session.expires_at.min(cutoff);
        })
        .await
    }

    pub async fn push_flash(&self, id: &str, flash: Flash) -> bool {
        self.update(id, |session| session.flashes.push(flash)).await
    }

    /// Remove and return the pending flashes
    pub async fn take_flashes(&self, id: &str) -> Vec<Flash> {
        let mut flashes = Vec::new();
        self.update(id, |session| flashes = std::mem::take(&mut session.flashes))
            .await;
        flashes
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before_count = sessions.len();

        sessions.retain(|_, session| now < session.expires_at);

        let after_count = sessions.len();
        let removed = before_count - after_count;
        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(after_count as f64);
            tracing::debug!(removed, "expired sessions removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn update<F: FnOnce(&mut Session)>(&self, id: &str, f: F) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if now < session.expires_at => {
                f(session);
                true
            },
            _ => false,
        }
    }
}
