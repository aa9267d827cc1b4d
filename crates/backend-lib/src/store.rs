// ============================
// enrol-backend-lib/src/store.rs
// ============================
//! User record store with flat-file and in-memory implementations.
//!
//! Both implementations enforce one account per email address
//! (case-insensitive) at insert time, and keep the ledger of consumed
//! confirmation tokens.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use enrol_common::PendingSignup;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use uuid::Uuid;

/// A registered account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// scrypt PHC string
    pub password_hash: String,
    pub name: String,
    pub surname: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub surname: String,
}

impl From<PendingSignup> for NewUser {
    fn from(pending: PendingSignup) -> Self {
        Self {
            email: pending.email,
            password_hash: pending.password,
            name: pending.name,
            surname: pending.surname,
        }
    }
}

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email {0} is already registered")]
    DuplicateEmail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Trait for user record backends
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look a user up by email, ignoring case and surrounding whitespace
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look a user up by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a user; fails with [`StoreError::DuplicateEmail`] when the
    /// address is already taken
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Whether a confirmation token has already been used
    async fn is_token_consumed(&self, token_id: &str) -> Result<bool, StoreError>;

    /// Record a confirmation token as used until `expires_at`.
    /// Returns `false` when it was already recorded.
    async fn consume_token(
        &self,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Drop ledger entries whose token would have expired by `now`
    async fn purge_consumed_tokens(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Canonical form used for uniqueness checks
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn digest_key(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn new_record(new_user: NewUser) -> User {
    User {
        id: Uuid::new_v4(),
        email: new_user.email.trim().to_string(),
        password_hash: new_user.password_hash,
        name: new_user.name,
        surname: new_user.surname,
        created_at: Utc::now(),
    }
}

/// Flat-file implementation of the [`UserStore`] trait.
///
/// Layout under the root directory:
///
/// * `users/<id>.json` — one record per user
/// * `emails/<sha256(email)>` — uniqueness claim holding the owning user id
/// * `consumed-tokens/<sha256(token id)>` — replay ledger entry holding its expiry
#[derive(Clone, Debug)]
pub struct FlatFileUserStore {
    root: PathBuf,
}

impl FlatFileUserStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("users"))?;
        std::fs::create_dir_all(root.join("emails"))?;
        std::fs::create_dir_all(root.join("consumed-tokens"))?;
        Ok(Self { root })
    }

    fn user_path(&self, id: Uuid) -> PathBuf {
        self.root.join("users").join(format!("{id}.json"))
    }

    fn email_claim_path(&self, email: &str) -> PathBuf {
        self.root
            .join("emails")
            .join(digest_key(&normalize_email(email)))
    }

    fn ledger_path(&self, token_id: &str) -> PathBuf {
        self.root.join("consumed-tokens").join(digest_key(token_id))
    }

    /// Write `contents` to a scratch file next to `dest`, returning its path
    async fn write_scratch(&self, dest: &Path, contents: &[u8]) -> Result<PathBuf, StoreError> {
        let dir = dest.parent().unwrap_or(&self.root);
        let scratch = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = tokio_fs::File::create(&scratch).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok(scratch)
    }
}

#[async_trait]
impl UserStore for FlatFileUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let claim = match tokio_fs::read_to_string(self.email_claim_path(email)).await {
            Ok(claim) => claim,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Ok(id) = Uuid::parse_str(claim.trim()) else {
            tracing::warn!(email, "ignoring unreadable email claim");
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let content = match tokio_fs::read_to_string(self.user_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = new_record(new_user);
        let user_path = self.user_path(user.id);
        let claim_path = self.email_claim_path(&user.email);

        // Record first, so a visible claim always points at a readable user
        let json = serde_json::to_vec_pretty(&user)?;
        let scratch = self.write_scratch(&user_path, &json).await?;
        tokio_fs::rename(&scratch, &user_path).await?;

        // Claim the address; hard_link fails atomically when it already exists
        let scratch = self
            .write_scratch(&claim_path, user.id.to_string().as_bytes())
            .await?;
        let claimed = tokio_fs::hard_link(&scratch, &claim_path).await;
        let _ = tokio_fs::remove_file(&scratch).await;

        match claimed {
            Ok(()) => {
                tracing::debug!(user_id = %user.id, "user record created");
                Ok(user)
            },
            Err(e) => {
                let _ = tokio_fs::remove_file(&user_path).await;
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Err(StoreError::DuplicateEmail(user.email))
                } else {
                    Err(e.into())
                }
            },
        }
    }

    async fn is_token_consumed(&self, token_id: &str) -> Result<bool, StoreError> {
        Ok(tokio_fs::try_exists(self.ledger_path(token_id)).await?)
    }

    async fn consume_token(
        &self,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let path = self.ledger_path(token_id);
        let scratch = self
            .write_scratch(&path, expires_at.to_rfc3339().as_bytes())
            .await?;
        let linked = tokio_fs::hard_link(&scratch, &path).await;
        let _ = tokio_fs::remove_file(&scratch).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_consumed_tokens(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut entries = tokio_fs::read_dir(self.root.join("consumed-tokens")).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(".tmp-") {
                continue;
            }
            let content = tokio_fs::read_to_string(entry.path()).await?;
            let expired = DateTime::parse_from_rfc3339(content.trim())
                .map(|at| at.with_timezone(&Utc) < now)
                .unwrap_or(false);
            if expired {
                tokio_fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// In-memory implementation of the [`UserStore`] trait
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
    consumed: DashMap<String, DateTime<Utc>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.emails.get(&normalize_email(email)).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = new_record(new_user);
        match self.emails.entry(normalize_email(&user.email)) {
            Entry::Occupied(_) => Err(StoreError::DuplicateEmail(user.email)),
            Entry::Vacant(slot) => {
                // Insert the record before releasing the email entry lock
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            },
        }
    }

    async fn is_token_consumed(&self, token_id: &str) -> Result<bool, StoreError> {
        Ok(self.consumed.contains_key(token_id))
    }

    async fn consume_token(
        &self,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        match self.consumed.entry(token_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            },
        }
    }

    async fn purge_consumed_tokens(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.consumed.len();
        self.consumed.retain(|_, expires_at| *expires_at >= now);
        Ok(before - self.consumed.len())
    }
}
