// ============================
// enrol-backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides, e.g. `ENROL_SECRET_KEY`
pub const ENV_PREFIX: &str = "ENROL_";

/// Salt used for confirmation tokens unless configured otherwise
pub const DEFAULT_CONFIRMATION_SALT: &str = "email-confirmation-salt";

/// Validity window of a confirmation link
pub const DEFAULT_CONFIRMATION_MAX_AGE_SECS: u64 = 3600;

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 16;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Directory holding the flat-file user store
    pub data_dir: PathBuf,
    /// Log level (`RUST_LOG` still wins when set)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Secret mixed into every token signature
    pub secret_key: String,
    /// Externally visible origin used to build confirmation links
    pub public_base_url: String,
    pub confirmation: ConfirmationSettings,
    pub session: SessionSettings,
    pub password: PasswordSettings,
    pub mail: MailSettings,
    pub site: SiteSettings,
}

/// Confirmation token parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationSettings {
    pub salt: String,
    pub max_age_secs: u64,
}

/// Browser session parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Lifetime of a signed-in session
    pub ttl_secs: u64,
    /// Lifetime of a session that only carries flash messages
    pub anonymous_ttl_secs: u64,
    /// Anonymous sessions kept at once; the oldest is evicted beyond this
    pub max_anonymous: usize,
    /// Add the `Secure` attribute to the session cookie
    pub secure_cookie: bool,
}

/// Password hashing cost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    /// scrypt CPU/memory cost as a power of two
    pub scrypt_log_n: u8,
}

/// Which mail collaborator is wired in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Deliver through an SMTP relay
    Smtp,
    /// Write messages to the log only
    #[serde(alias = "memory")]
    Log,
}

/// SMTP connection security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    Starttls,
    Tls,
    None,
}

/// Outbound mail settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub transport: MailTransport,
    /// `From` mailbox, e.g. `Enrol <no-reply@example.com>`
    pub sender: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_tls: SmtpTls,
    pub timeout_secs: u64,
}

/// Values exposed to every rendered page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub app_name: String,
    pub environment: String,
    pub domain: String,
    pub app_version: String,
}

const REDACTED: &str = "[redacted]";

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        REDACTED
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("secret_key", &redact(&self.secret_key))
            .field("public_base_url", &self.public_base_url)
            .field("confirmation", &self.confirmation)
            .field("session", &self.session)
            .field("password", &self.password)
            .field("mail", &self.mail)
            .field("site", &self.site)
            .finish()
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("transport", &self.transport)
            .field("sender", &self.sender)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &redact(&self.smtp_password))
            .field("smtp_tls", &self.smtp_tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_json: false,
            secret_key: String::new(),
            public_base_url: "http://localhost:3000".to_string(),
            confirmation: ConfirmationSettings::default(),
            session: SessionSettings::default(),
            password: PasswordSettings::default(),
            mail: MailSettings::default(),
            site: SiteSettings::default(),
        }
    }
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            salt: DEFAULT_CONFIRMATION_SALT.to_string(),
            max_age_secs: DEFAULT_CONFIRMATION_MAX_AGE_SECS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "enrol_session".to_string(),
            ttl_secs: 60 * 60 * 24 * 7, // 7 days
            anonymous_ttl_secs: 60 * 30,
            max_anonymous: 10_000,
            secure_cookie: false,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self { scrypt_log_n: 15 }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            sender: "Enrol <no-reply@localhost>".to_string(),
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_tls: SmtpTls::Starttls,
            timeout_secs: 10,
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            app_name: "Enrol".to_string(),
            environment: "development".to_string(),
            domain: "localhost".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Settings {
    /// Layered provider: defaults, then the TOML file, then `ENROL_*` env vars.
    /// Nested keys use a double underscore, e.g. `ENROL_MAIL__SMTP_HOST`.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings from `config.toml` in the working directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.toml")
    }

    /// Load and validate settings from an explicit file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level `{}`",
                self.log_level
            )));
        }
        if self.secret_key.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "secret_key must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.confirmation.salt.is_empty() {
            return Err(ConfigError::Invalid("confirmation.salt is empty".into()));
        }
        if self.confirmation.max_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "confirmation.max_age_secs must be positive".into(),
            ));
        }
        if self.session.ttl_secs == 0 || self.session.anonymous_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.ttl_secs and session.anonymous_ttl_secs must be positive".into(),
            ));
        }
        if self.session.max_anonymous == 0 {
            return Err(ConfigError::Invalid(
                "session.max_anonymous must be positive".into(),
            ));
        }
        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid(format!(
                "invalid session cookie name `{}`",
                self.session.cookie_name
            )));
        }
        if !(self.public_base_url.starts_with("http://")
            || self.public_base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "public_base_url `{}` must be an http(s) URL",
                self.public_base_url
            )));
        }
        if !(1..=31).contains(&self.password.scrypt_log_n) {
            return Err(ConfigError::Invalid(
                "password.scrypt_log_n must be between 1 and 31".into(),
            ));
        }
        if self.mail.transport == MailTransport::Smtp && self.mail.smtp_host.is_empty() {
            return Err(ConfigError::Invalid(
                "mail.smtp_host is required for the smtp transport".into(),
            ));
        }
        if self.mail.sender.is_empty() {
            return Err(ConfigError::Invalid("mail.sender is empty".into()));
        }
        Ok(())
    }

    /// Confirmation link validity window
    pub fn confirmation_max_age(&self) -> Duration {
        Duration::from_secs(self.confirmation.max_age_secs)
    }

    /// Signed-in session lifetime
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    /// Lifetime of a session holding nothing but flash messages
    pub fn anonymous_session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.anonymous_ttl_secs)
    }

    /// Absolute confirmation link for a token
    pub fn confirmation_link(&self, token: &str) -> String {
        format!(
            "{}/confirm/{}",
            self.public_base_url.trim_end_matches('/'),
            token
        )
    }
}
