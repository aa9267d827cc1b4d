// ============================
// enrol-backend-lib/src/mail.rs
// ============================
//! Outbound mail delivery.
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::{MailSettings, SmtpTls};

/// Mail delivery failures
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address `{address}`: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// A plaintext message ready to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail delivery collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a bare `user@domain` address.
///
/// Display-name forms such as `Bob <bob@example.com>` are rejected, so the
/// result can serve as an account key.
pub fn parse_address(address: &str) -> Result<Address, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Delivers through an SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn from_settings(settings: &MailSettings) -> Result<Self, MailError> {
        let sender = parse_mailbox(&settings.sender)?;
        let host = settings.smtp_host.as_str();

        let builder = match settings.smtp_tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailError::Transport(e.to_string()))?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| MailError::Transport(e.to_string()))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };

        let mut builder = builder
            .port(settings.smtp_port)
            .timeout(Some(Duration::from_secs(settings.timeout_secs)));
        if !settings.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.smtp_username.clone(),
                settings.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(Mailbox::new(None, parse_address(&email.to)?))
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Writes messages to the log and drops them.
///
/// Wired in when no SMTP relay is configured; the confirmation link shows up
/// in the server log.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        parse_address(&email.to)?;
        tracing::info!(to = %email.to, subject = %email.subject, body = %email.body, "email logged, not delivered");
        Ok(())
    }
}

/// Messages a [`MemoryMailer`] keeps unless told otherwise
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Keeps the most recent messages in memory.
///
/// The outbox is bounded; once full, the oldest message is dropped.
#[derive(Debug)]
pub struct MemoryMailer {
    outbox: Mutex<VecDeque<OutgoingEmail>>,
    capacity: usize,
    failure: Mutex<Option<String>>,
}

impl Default for MemoryMailer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outbox: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            failure: Mutex::new(None),
        }
    }

    /// Make every following delivery fail with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    /// Messages still held, oldest first
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Most recent message addressed to `to`
    pub fn last_to(&self, to: &str) -> Option<OutgoingEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|email| email.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if let Some(reason) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(MailError::Transport(reason));
        }
        // Same validation the SMTP path applies
        parse_address(&email.to)?;

        tracing::debug!(to = %email.to, subject = %email.subject, "email queued in memory");
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        if outbox.len() >= self.capacity {
            outbox.pop_front();
        }
        outbox.push_back(email.clone());
        Ok(())
    }
}
