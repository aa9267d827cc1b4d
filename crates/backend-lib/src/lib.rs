// ============================
// enrol-backend-lib/src/lib.rs
// ============================
//! Core functionality of the enrol signup server.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod mail;
pub mod metrics;
pub mod middleware;
pub mod render;
pub mod router;
pub mod signup;
pub mod store;
pub mod token;

use std::sync::Arc;

use crate::auth::{AuthService, DefaultAuth, SessionManager};
use crate::clock::{Clock, SystemClock};
use crate::config::{MailTransport, Settings};
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::render::{BuiltinRenderer, Renderer};
use crate::signup::{ConfirmationFlow, RegistrationFlow};
use crate::store::{FlatFileUserStore, UserStore};
use crate::token::TokenService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    /// Record store, also holding the consumed-token ledger
    pub users: Arc<dyn UserStore>,
    /// Password checks and user creation
    pub auth: Arc<dyn AuthService>,
    /// Browser sessions and flash messages
    pub sessions: Arc<SessionManager>,
    /// Page templates
    pub renderer: Arc<dyn Renderer>,
    /// Signup form to confirmation email
    pub registration: Arc<RegistrationFlow>,
    /// Confirmation link to user record
    pub confirmation: Arc<ConfirmationFlow>,
    /// Time source for background cleanup
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the services together around the given collaborators
    pub fn new(
        settings: Settings,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = Arc::new(settings);
        let auth: Arc<dyn AuthService> = Arc::new(DefaultAuth::new(
            users.clone(),
            settings.password.scrypt_log_n,
        ));
        let tokens = Arc::new(TokenService::new(
            settings.secret_key.as_bytes().to_vec(),
            clock.clone(),
        ));
        let sessions = Arc::new(SessionManager::new(
            settings.session_ttl(),
            settings.anonymous_session_ttl(),
            settings.session.max_anonymous,
            clock.clone(),
        ));
        let renderer: Arc<dyn Renderer> = Arc::new(BuiltinRenderer::new(&settings.site));
        let registration = Arc::new(RegistrationFlow::new(
            auth.clone(),
            tokens.clone(),
            mailer,
            settings.clone(),
        ));
        let confirmation = Arc::new(ConfirmationFlow::new(
            auth.clone(),
            users.clone(),
            tokens,
            settings.clone(),
        ));

        Self {
            settings,
            users,
            auth,
            sessions,
            renderer,
            registration,
            confirmation,
            clock,
        }
    }

    /// Production wiring: flat-file store under `data_dir`, mail transport
    /// from the settings, system clock
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = Arc::new(FlatFileUserStore::new(&settings.data_dir)?);
        let mailer: Arc<dyn Mailer> = match settings.mail.transport {
            MailTransport::Smtp => Arc::new(SmtpMailer::from_settings(&settings.mail)?),
            MailTransport::Log => {
                tracing::warn!("no SMTP relay configured, confirmation emails are only logged");
                Arc::new(LogMailer)
            },
        };
        Ok(Self::new(settings, users, mailer, Arc::new(SystemClock)))
    }
}
