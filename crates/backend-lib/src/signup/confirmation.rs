use std::sync::Arc;

use chrono::{DateTime, Utc};
use enrol_common::PendingSignup;
use metrics::counter;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics::{CONFIRM_FAILED, CONFIRM_SUCCEEDED};
use crate::store::{User, UserStore};
use crate::token::TokenService;

/// Turns a confirmation link into a user record
pub struct ConfirmationFlow {
    auth: Arc<dyn AuthService>,
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    settings: Arc<Settings>,
}

impl ConfirmationFlow {
    pub fn new(
        auth: Arc<dyn AuthService>,
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            auth,
            users,
            tokens,
            settings,
        }
    }

    /// Verify `token` and create the user it describes.
    ///
    /// A given token creates at most one user; later visits fail with
    /// [`AppError::TokenAlreadyUsed`].
    #[tracing::instrument(skip_all)]
    pub async fn confirm(&self, token: &str) -> Result<User, AppError> {
        let result = self.run(token).await;
        match &result {
            Ok(user) => {
                counter!(CONFIRM_SUCCEEDED).increment(1);
                tracing::info!(user_id = %user.id, "email confirmed, user created");
            },
            Err(e) => {
                counter!(CONFIRM_FAILED).increment(1);
                tracing::warn!(code = e.error_code(), error = %e, "confirmation failed");
            },
        }
        result
    }

    async fn run(&self, token: &str) -> Result<User, AppError> {
        let max_age = self.settings.confirmation_max_age();
        let pending: PendingSignup = self
            .tokens
            .verify(token, &self.settings.confirmation.salt, max_age)?;

        let token_id = TokenService::token_id(token).ok_or(AppError::InvalidToken)?;
        if self.users.is_token_consumed(token_id).await? {
            return Err(AppError::TokenAlreadyUsed);
        }

        let user = self.auth.create_with_profile(pending).await?;

        // Keep the ledger entry until the token could no longer verify anyway
        let expires_at = TokenService::issued_at(token)
            .and_then(|issued| DateTime::<Utc>::from_timestamp(issued, 0))
            .and_then(|issued| {
                chrono::Duration::from_std(max_age)
                    .ok()
                    .and_then(|age| issued.checked_add_signed(age))
            })
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        // The user exists from here on; a ledger failure must not hide that
        match self.users.consume_token(token_id, expires_at).await {
            Ok(true) => {},
            Ok(false) => {
                tracing::warn!(user_id = %user.id, "confirmation token consumed concurrently");
            },
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "failed to record consumed confirmation token");
            },
        }

        Ok(user)
    }
}
