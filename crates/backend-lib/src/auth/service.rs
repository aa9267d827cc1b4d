use async_trait::async_trait;
use enrol_common::PendingSignup;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::User;

#[async_trait]
pub trait AuthService: Send + Sync {
    /// True when no user owns `email`
    async fn is_email_available(&self, email: &str) -> Result<bool, AppError>;
    async fn hash_password(&self, plain: &str) -> Result<String, AppError>;
    /// The matching user, or `None` for an unknown email or wrong password
    async fn login(&self, email: &str, password: &str) -> Result<Option<User>, AppError>;
    /// Materialize a confirmed signup as a user record
    async fn create_with_profile(&self, pending: PendingSignup) -> Result<User, AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
}
