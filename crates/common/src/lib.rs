// ================
// common/src/lib.rs
// ================
//! Common types shared by the enrol server and its test-suite.
//! Defines the submitted forms and the payload carried inside a
//! confirmation token.

use serde::{Deserialize, Serialize};

/// Fields submitted by the signup form (`POST /signup/`)
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SignupForm {
    /// Address the confirmation link is sent to
    pub email: String,
    /// Plaintext password, hashed before it leaves the request
    pub password: String,
    /// Given name
    pub name: String,
    /// Family name
    pub surname: String,
}

impl SignupForm {
    /// Names of the fields that fail the minimal presence checks.
    /// An empty result means the form can be processed.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.email.trim().is_empty() || !self.email.contains('@') {
            missing.push("email");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.surname.trim().is_empty() {
            missing.push("surname");
        }
        missing
    }
}

/// Fields submitted by the login form (`POST /login`)
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// A signup waiting for its email to be confirmed.
///
/// Never persisted: it only exists inside a signed confirmation token and is
/// turned into a user record when the link is visited.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingSignup {
    pub email: String,
    /// Credential in PHC string form (`$scrypt$...`)
    pub password: String,
    pub name: String,
    pub surname: String,
}

/// Severity of a one-shot message shown on the next rendered page
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Info,
    Error,
}

/// One-shot message stored in the session until the next page render
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}
