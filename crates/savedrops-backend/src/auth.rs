//! ---
//! sd_section: "03-data-backend"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Account identity and session management."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::{collections, DocumentStore};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_FAILED_ATTEMPTS: usize = 5;
const FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// Errors surfaced by the authentication service. Messages are user-facing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailInUse,
    #[error("please enter a valid email address")]
    InvalidEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("too many sign-in attempts; try again later")]
    RateLimited,
    #[error("network error; check your connection and try again")]
    NetworkFailure,
}

/// Session handed to components that act on behalf of a signed-in user.
///
/// Created by sign-in, dropped by sign-out; passed explicitly rather than
/// looked up through ambient global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    /// Stable account identifier.
    pub user_id: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredAccount {
    user_id: String,
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct FailureLog {
    attempts: Vec<Instant>,
}

impl FailureLog {
    fn record(&mut self, now: Instant) {
        self.attempts.push(now);
        self.prune(now);
    }

    fn prune(&mut self, now: Instant) {
        self.attempts
            .retain(|at| now.duration_since(*at) < FAILURE_WINDOW);
    }

    fn throttled(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.attempts.len() >= MAX_FAILED_ATTEMPTS
    }
}

/// In-process identity provider backed by the document store.
///
/// Accounts live in memory; the public `users` profile document is written to
/// the store on sign-up like the hosted service did.
#[derive(Clone)]
pub struct AuthService {
    store: DocumentStore,
    accounts: Arc<RwLock<HashMap<String, StoredAccount>>>,
    failures: Arc<RwLock<HashMap<String, FailureLog>>>,
    session: Arc<RwLock<Option<UserSession>>>,
    offline: Arc<AtomicBool>,
}

impl AuthService {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            accounts: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            session: Arc::new(RwLock::new(None)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Toggle failure injection. While offline every auth call returns
    /// [`AuthError::NetworkFailure`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(AuthError::NetworkFailure);
        }
        Ok(())
    }

    /// Client-side validation run before any backend call.
    pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        Ok(())
    }

    /// Create an account, write its profile stub, and open a session.
    pub fn sign_up(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        self.check_online()?;
        let email = email.trim().to_ascii_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(AuthError::InvalidEmail);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }

        let salt = random_salt();
        let account = StoredAccount {
            user_id: uuid::Uuid::new_v4().to_string(),
            salt: salt.clone(),
            password_hash: hash_password(&salt, password),
            created_at: Utc::now(),
        };
        let session = UserSession {
            user_id: account.user_id.clone(),
            email: email.clone(),
            issued_at: Utc::now(),
        };
        accounts.insert(email.clone(), account);
        drop(accounts);

        self.store
            .append(
                collections::USERS,
                json!({
                    "userId": session.user_id,
                    "email": email,
                    "createdAt": session.issued_at,
                    "profileComplete": false,
                }),
            )
            .map_err(|_| AuthError::NetworkFailure)?;

        info!(user = %session.user_id, "account created");
        *self.session.write() = Some(session.clone());
        Ok(session)
    }

    /// Verify credentials and open a session. Repeated failures for the same
    /// email within a short window are throttled.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        self.check_online()?;
        let email = email.trim().to_ascii_lowercase();
        let now = Instant::now();
        if self
            .failures
            .write()
            .entry(email.clone())
            .or_default()
            .throttled(now)
        {
            warn!(email = %email, "sign-in throttled");
            return Err(AuthError::RateLimited);
        }

        let verified = {
            let accounts = self.accounts.read();
            accounts
                .get(&email)
                .filter(|account| account.password_hash == hash_password(&account.salt, password))
                .map(|account| account.user_id.clone())
        };

        match verified {
            Some(user_id) => {
                self.failures.write().remove(&email);
                let session = UserSession {
                    user_id,
                    email,
                    issued_at: Utc::now(),
                };
                *self.session.write() = Some(session.clone());
                Ok(session)
            }
            None => {
                self.failures
                    .write()
                    .entry(email)
                    .or_default()
                    .record(now);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// The currently signed-in session, if any.
    pub fn current_user(&self) -> Option<UserSession> {
        self.session.read().clone()
    }

    /// Tear down the active session.
    pub fn sign_out(&self) {
        if let Some(session) = self.session.write().take() {
            info!(user = %session.user_id, "signed out");
        }
    }

    /// Request a password reset. Like the hosted service, the call succeeds
    /// whether or not the email is registered so account existence is not
    /// leaked.
    pub fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        self.check_online()?;
        let email = email.trim().to_ascii_lowercase();
        let known = self.accounts.read().contains_key(&email);
        info!(known, "password reset requested");
        Ok(())
    }

    /// Age of the account backing `email`, for diagnostics.
    pub fn account_created_at(&self, email: &str) -> Option<DateTime<Utc>> {
        self.accounts
            .read()
            .get(&email.trim().to_ascii_lowercase())
            .map(|account| account.created_at)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

fn random_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
