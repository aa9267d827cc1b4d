use std::sync::Arc;

use enrol_common::{PendingSignup, SignupForm};
use metrics::counter;

use super::{confirmation_body, CONFIRMATION_SUBJECT};
use crate::auth::AuthService;
use crate::config::Settings;
use crate::error::AppError;
use crate::mail::{parse_address, Mailer, OutgoingEmail};
use crate::metrics::{SIGNUP_MAIL_FAILED, SIGNUP_REJECTED, SIGNUP_REQUESTED};
use crate::token::TokenService;

/// Outcome of a successful registration
#[derive(Debug, Clone)]
pub struct IssuedConfirmation {
    pub email: String,
    pub token: String,
    pub link: String,
}

/// Availability check, token issuance and confirmation email
pub struct RegistrationFlow {
    auth: Arc<dyn AuthService>,
    tokens: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
    settings: Arc<Settings>,
}

impl RegistrationFlow {
    pub fn new(
        auth: Arc<dyn AuthService>,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            auth,
            tokens,
            mailer,
            settings,
        }
    }

    /// Run a signup. Nothing is persisted; the account only exists once the
    /// emailed link is visited.
    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn register(&self, form: &SignupForm) -> Result<IssuedConfirmation, AppError> {
        counter!(SIGNUP_REQUESTED).increment(1);

        let missing = form.missing_fields();
        if !missing.is_empty() {
            counter!(SIGNUP_REJECTED).increment(1);
            return Err(AppError::InvalidInput(format!(
                "missing or invalid: {}",
                missing.join(", ")
            )));
        }

        // Only a bare address may become an account key
        let email = match parse_address(form.email.trim()) {
            Ok(address) => address.to_string(),
            Err(e) => {
                counter!(SIGNUP_REJECTED).increment(1);
                return Err(e.into());
            },
        };
        if !self.auth.is_email_available(&email).await? {
            counter!(SIGNUP_REJECTED).increment(1);
            tracing::info!("signup rejected, email already registered");
            return Err(AppError::EmailUnavailable(email));
        }

        let pending = PendingSignup {
            email: email.clone(),
            password: self.auth.hash_password(&form.password).await?,
            name: form.name.trim().to_string(),
            surname: form.surname.trim().to_string(),
        };
        let token = self
            .tokens
            .issue(&pending, &self.settings.confirmation.salt)?;
        let link = self.settings.confirmation_link(&token);

        let message = OutgoingEmail {
            to: email.clone(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            body: confirmation_body(&link),
        };
        if let Err(e) = self.mailer.send(&message).await {
            counter!(SIGNUP_MAIL_FAILED).increment(1);
            tracing::error!(error = %e, "confirmation email not delivered");
            return Err(e.into());
        }

        tracing::info!("confirmation email sent");
        Ok(IssuedConfirmation { email, token, link })
    }
}
