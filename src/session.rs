//! Login credentials and per-browser sessions.
//!
//! A session is stored the first time a request has something to keep, such as a login attempt,
//! and is found again through the `session` cookie. It records who is logged in, the table
//! snapshot the pages render from, and a message to show on the next page. Sessions left idle for
//! longer than [`SESSION_IDLE_TTL`] are forgotten.

use crate::model::Transactions;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a session survives without a request.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// The lowercase hex SHA-256 of `password`, the form stored in `config.json`.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    format!("{digest:x}")
}

/// True when `username` exists in `users` and `password` hashes to its stored hash. Both are
/// trimmed first, and usernames are compared exactly.
pub fn check_credentials(users: &BTreeMap<String, String>, username: &str, password: &str) -> bool {
    let Some(stored) = users.get(username.trim()) else {
        return false;
    };
    let candidate = hash_password(password.trim());
    constant_time_eq(candidate.as_bytes(), stored.trim().to_ascii_lowercase().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The colour of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Warning,
    Error,
}

/// A message shown once, on the next page rendered for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// The state of one browser session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<String>,
    table: Option<(Transactions, Instant)>,
    flash: Option<Flash>,
}

impl Session {
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// The table this session last loaded, if any.
    pub fn table(&self) -> Option<&Transactions> {
        self.table.as_ref().map(|(table, _)| table)
    }

    /// The snapshot, if it was loaded less than `max_age` ago.
    pub fn fresh_table(&self, max_age: Duration) -> Option<&Transactions> {
        self.table
            .as_ref()
            .filter(|(_, loaded_at)| loaded_at.elapsed() < max_age)
            .map(|(table, _)| table)
    }

    pub fn set_table(&mut self, table: Transactions) {
        self.table = Some((table, Instant::now()));
    }

    pub fn set_flash(&mut self, flash: Flash) {
        self.flash = Some(flash);
    }

    /// Removes and returns the pending message.
    pub fn take_flash(&mut self) -> Option<Flash> {
        self.flash.take()
    }
}

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

impl Entry {
    fn is_expired(&self, idle_ttl: Duration) -> bool {
        self.last_seen.elapsed() >= idle_ttl
    }
}

/// Every live session, keyed by the ID in the `session` cookie.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(SESSION_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// Stores an empty, logged-out session under `id` unless one is already live. Expired
    /// sessions are evicted first.
    pub async fn ensure(&self, id: Uuid) {
        let mut sessions = self.inner.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(self.idle_ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {evicted} idle sessions");
        }
        sessions.entry(id).or_insert_with(|| {
            debug!("Created session {id}");
            Entry {
                session: Session::default(),
                last_seen: Instant::now(),
            }
        });
    }

    /// A copy of the session, or `None` if the ID is unknown or the session expired.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.update(id, |session| session.clone()).await
    }

    /// Runs `f` on the session and returns its result, or `None` if the ID is unknown or the
    /// session expired. Counts as activity.
    pub async fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut sessions = self.inner.lock().await;
        if sessions
            .get(&id)
            .is_some_and(|entry| entry.is_expired(self.idle_ttl))
        {
            debug!("Session {id} expired");
            sessions.remove(&id);
            return None;
        }
        sessions.get_mut(&id).map(|entry| {
            entry.last_seen = Instant::now();
            f(&mut entry.session)
        })
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Checks the credentials and marks the session logged in on success. A failed attempt leaves
    /// the session logged out, even if it was logged in before. The session is stored if it was
    /// not already.
    pub async fn login(
        &self,
        id: Uuid,
        users: &BTreeMap<String, String>,
        username: &str,
        password: &str,
    ) -> bool {
        let ok = check_credentials(users, username, password);
        let username = username.trim().to_string();
        self.ensure(id).await;
        self.update(id, |session| {
            if ok {
                session.user = Some(username.clone());
            } else {
                *session = Session::default();
            }
        })
        .await;
        if ok {
            info!("User '{username}' logged in");
        } else {
            warn!("Failed login attempt for user '{username}'");
        }
        ok
    }

    /// Forgets the session entirely.
    pub async fn logout(&self, id: Uuid) {
        if let Some(entry) = self.inner.lock().await.remove(&id) {
            if let Some(user) = entry.session.user {
                info!("User '{user}' logged out");
            }
        }
    }
}
