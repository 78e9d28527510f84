//! The active peer table — an in-memory, bounded registry of logged-in peers.
//!
//! A peer is "active" from the moment its session is added until it is
//! removed by disconnect, reaper eviction, or token rotation under
//! [`crate::session_manager::SessionManager::resume`]. Liveness is used as a
//! filter everywhere the file index answers queries, so lookups here happen
//! on every `searchFile`/`getFileHostInfo` call and must stay cheap.
//!
//! Guarded by a single `parking_lot::RwLock` — mutating and reading
//! operations all acquire it, and `list()` returns a deep copy so callers
//! iterate without holding the lock.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single live peer session.
#[derive(Debug)]
pub struct Session {
    pub user_name: String,
    pub token: String,
    pub ip: String,
    pub port: u16,
    last_active: AtomicU64,
}

impl Session {
    fn new(user_name: String, token: String, ip: String, port: u16) -> Self {
        Session {
            user_name,
            token,
            ip,
            port,
            last_active: AtomicU64::new(now_secs()),
        }
    }

    /// Seconds since the Unix epoch at which this session was last touched.
    pub fn last_active(&self) -> u64 {
        self.last_active.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.last_active.store(now_secs(), Ordering::SeqCst);
    }
}

/// A deep copy of a session's visible state, safe to hold without the table lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub user_name: String,
    pub token: String,
    pub ip: String,
    pub port: u16,
    pub last_active: u64,
}

impl From<&Arc<Session>> for SessionSnapshot {
    fn from(session: &Arc<Session>) -> Self {
        SessionSnapshot {
            user_name: session.user_name.clone(),
            token: session.token.clone(),
            ip: session.ip.clone(),
            port: session.port,
            last_active: session.last_active(),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

/// Bounded, thread-safe registry of active peer sessions, keyed by user name.
#[derive(Clone)]
pub struct ActivePeerTable {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    max_users: usize,
}

impl ActivePeerTable {
    /// Construct a table bounded to `max_users` concurrent sessions.
    pub fn new(max_users: usize) -> Self {
        ActivePeerTable {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_users,
        }
    }

    /// Insert a new session for `name` if capacity allows and no session
    /// already exists under that name.
    ///
    /// Returns `Ok(())` on success, `Err(true)` if the table is full, and
    /// `Err(false)` if `name` already has a live session (duplicate login).
    pub fn add(&self, name: &str, token: &str, ip: &str, port: u16) -> Result<(), AddError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(name) {
            return Err(AddError::Duplicate);
        }
        if sessions.len() >= self.max_users {
            return Err(AddError::Full);
        }
        sessions.insert(
            name.to_string(),
            Arc::new(Session::new(
                name.to_string(),
                token.to_string(),
                ip.to_string(),
                port,
            )),
        );
        tracing::debug!(name, total = sessions.len(), "session added");
        Ok(())
    }

    /// Remove the session for `name`, but only if `token` matches exactly.
    pub fn remove(&self, name: &str, token: &str) -> bool {
        let mut sessions = self.sessions.write();
        let matches = sessions.get(name).is_some_and(|s| s.token == token);
        if matches {
            sessions.remove(name);
            tracing::debug!(name, remaining = sessions.len(), "session removed");
        }
        matches
    }

    /// Look up a session by user name.
    pub fn find(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(name).cloned()
    }

    /// Whether `name` currently has a live session (used by the file index's
    /// liveness filter).
    pub fn is_active(&self, name: &str) -> bool {
        self.sessions.read().contains_key(name)
    }

    /// Deep-copy snapshot of all live sessions, safe to iterate without
    /// holding the table lock.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        self.sessions.read().values().map(SessionSnapshot::from).collect()
    }

    /// Refresh `name`'s liveness timestamp to now. No-op if `name` has no
    /// live session.
    pub fn touch(&self, name: &str) {
        if let Some(session) = self.sessions.read().get(name) {
            session.touch();
        }
    }

    /// Whether the table has room for at least one more session.
    pub fn has_space(&self) -> bool {
        self.sessions.read().len() < self.max_users
    }

    /// Current number of live sessions.
    pub fn size(&self) -> usize {
        self.sessions.read().len()
    }

    /// Remove every session whose `last_active` is more than
    /// `threshold_secs` in the past. Returns the removed sessions so the
    /// caller (the reaper) can log them.
    pub fn evict_stale(&self, threshold_secs: u64) -> Vec<SessionSnapshot> {
        let now = now_secs();
        let mut sessions = self.sessions.write();
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now.saturating_sub(s.last_active()) > threshold_secs)
            .map(|(name, _)| name.clone())
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for name in stale {
            if let Some(session) = sessions.remove(&name) {
                evicted.push(SessionSnapshot::from(&session));
            }
        }
        evicted
    }
}

/// Why [`ActivePeerTable::add`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddError {
    Full,
    Duplicate,
}
