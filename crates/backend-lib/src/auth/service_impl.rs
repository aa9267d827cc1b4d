use std::sync::Arc;

use async_trait::async_trait;
use enrol_common::PendingSignup;
use uuid::Uuid;

use crate::auth::{password, AuthService};
use crate::error::AppError;
use crate::store::{NewUser, StoreError, User, UserStore};

/// [`AuthService`] backed by a [`UserStore`] and scrypt
pub struct DefaultAuth {
    users: Arc<dyn UserStore>,
    log_n: u8,
}

impl DefaultAuth {
    pub fn new(users: Arc<dyn UserStore>, log_n: u8) -> Self {
        Self { users, log_n }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn is_email_available(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.users.find_by_email(email).await?.is_none())
    }

    async fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        let mut plain = plain.to_string();
        let log_n = self.log_n;
        tokio::task::spawn_blocking(move || password::hash_password_secure(&mut plain, log_n))
            .await?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };

        let hash = user.password_hash.clone();
        let plain = password.to_string();
        let ok = tokio::task::spawn_blocking(move || password::verify_password(&hash, &plain))
            .await?;

        Ok(ok.then_some(user))
    }

    async fn create_with_profile(&self, pending: PendingSignup) -> Result<User, AppError> {
        self.users
            .create_user(NewUser::from(pending))
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail(email) => {
                    AppError::RecordCreation(format!("email {email} is already registered"))
                },
                other => AppError::RecordCreation(other.to_string()),
            })
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.find_by_id(id).await?)
    }
}
