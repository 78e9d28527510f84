//! Session Manager — login, resume, disconnect, heartbeat, and the
//! `verifyActive` authentication gate every other tracker operation sits
//! behind.
//!
//! A login/resume/disconnect protocol backed by a durable user table, built
//! on [`crate::peers::ActivePeerTable`] and
//! [`crate::persistence::PersistenceGateway`].

use std::sync::Arc;

use crate::auth;
use crate::error::{Result, TrackerError};
use crate::peers::{AddError, ActivePeerTable};
use crate::persistence::PersistenceGateway;
use crate::token;

/// Outcome of [`SessionManager::login`] or [`SessionManager::resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A brand-new `User` row was created for this login.
    New,
    /// An existing row was reused and ip/port were updated.
    Updated,
    /// An existing row was reused and nothing changed.
    Unchanged,
}

/// Maximum attempts to draw a token that doesn't collide with a live session
/// before giving up. Collision is vanishingly unlikely; this bound exists so
/// a degenerate RNG can't spin the caller forever.
const TOKEN_ISSUE_ATTEMPTS: usize = 16;

/// Authenticates peers against the durable user table and the in-memory
/// active peer table, and gates every other tracker RPC behind
/// [`SessionManager::verify_active`].
#[derive(Clone)]
pub struct SessionManager {
    peers: ActivePeerTable,
    storage: Arc<PersistenceGateway>,
}

impl SessionManager {
    pub fn new(peers: ActivePeerTable, storage: Arc<PersistenceGateway>) -> Self {
        SessionManager { peers, storage }
    }

    /// Shared handle to the active peer table, for components (the Reaper,
    /// the File Index) that need to read liveness without going through
    /// session operations.
    pub fn peers(&self) -> &ActivePeerTable {
        &self.peers
    }

    /// Draw a fresh hex token guaranteed (modulo the collision bound above)
    /// not to match any currently live session.
    fn issue_token(&self) -> Result<String> {
        for _ in 0..TOKEN_ISSUE_ATTEMPTS {
            let candidate = token::generate_token();
            if !self.peers.list().iter().any(|s| s.token == candidate) {
                return Ok(candidate);
            }
        }
        Err(TrackerError::Storage(
            "exhausted token issuance attempts without finding a free token".into(),
        ))
    }

    /// `Login(name, password, ip, port)` — see the File Index's `Register`
    /// for the companion sequence on the file side.
    pub async fn login(
        &self,
        name: &str,
        password: &str,
        ip: &str,
        port: u16,
    ) -> Result<(Outcome, String)> {
        if !self.peers.has_space() {
            return Err(TrackerError::SessionFull);
        }
        if self.peers.find(name).is_some() {
            return Err(TrackerError::DuplicateSession);
        }

        let token = self.issue_token()?;

        let outcome = match self.storage.fetch_user(name).await? {
            None => {
                let hash = auth::hash_password(password)?;
                self.storage.insert_user(name, &hash, ip, port).await?;
                Outcome::New
            }
            Some(user) => {
                if !auth::verify_password(password, &user.password)? {
                    return Err(TrackerError::BadPassword);
                }
                let mut changed = false;
                if user.ip != ip {
                    self.storage.update_user_ip(name, ip).await?;
                    changed = true;
                }
                if user.port != port as i32 {
                    self.storage.update_user_port(name, port).await?;
                    changed = true;
                }
                if changed {
                    Outcome::Updated
                } else {
                    Outcome::Unchanged
                }
            }
        };

        match self.peers.add(name, &token, ip, port) {
            Ok(()) => {}
            Err(AddError::Full) => return Err(TrackerError::SessionFull),
            Err(AddError::Duplicate) => return Err(TrackerError::DuplicateSession),
        }

        tracing::info!(name, outcome = ?outcome, "login");
        Ok((outcome, token))
    }

    /// `Resume(token, name, ip, port)` — re-authenticate a live session and
    /// rotate its token.
    pub async fn resume(
        &self,
        token: &str,
        name: &str,
        ip: &str,
        port: u16,
    ) -> Result<(Outcome, String)> {
        self.verify_active(token, name)?;

        let mut outcome = Outcome::Unchanged;
        if let Some(user) = self.storage.fetch_user(name).await? {
            if user.ip != ip {
                self.storage.update_user_ip(name, ip).await?;
                outcome = Outcome::Updated;
            }
            if user.port != port as i32 {
                self.storage.update_user_port(name, port).await?;
                outcome = Outcome::Updated;
            }
        }

        let new_token = self.issue_token()?;
        if !self.peers.remove(name, token) {
            return Err(TrackerError::BadCredentials);
        }
        self.peers
            .add(name, &new_token, ip, port)
            .map_err(|_| TrackerError::BadCredentials)?;

        tracing::info!(name, outcome = ?outcome, "session resumed, token rotated");
        Ok((outcome, new_token))
    }

    /// `Disconnect(token, name)`.
    pub fn disconnect(&self, token: &str, name: &str) -> Result<()> {
        self.verify_active(token, name)?;
        if self.peers.remove(name, token) {
            tracing::info!(name, "disconnected");
            Ok(())
        } else {
            Err(TrackerError::BadCredentials)
        }
    }

    /// `Heartbeat(token, name)`.
    pub fn heartbeat(&self, token: &str, name: &str) -> Result<()> {
        self.verify_active(token, name)?;
        self.peers.touch(name);
        Ok(())
    }

    /// `verifyActive` — the authentication gate used by every non-login
    /// operation. Accepts iff a live session exists under `name` whose
    /// token equals `token` byte-for-byte.
    pub fn verify_active(&self, token: &str, name: &str) -> Result<()> {
        match self.peers.find(name) {
            Some(session) if session.token == token => Ok(()),
            _ => Err(TrackerError::BadCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These exercise active-peer-table and authentication logic only. A
    // lazily-connected pool never opens a socket, so login/resume paths that
    // touch storage aren't exercised here.

    fn manager(max_users: usize) -> SessionManager {
        // `PgPool::connect_lazy` never opens a socket until first query, so
        // constructing a `SessionManager` for pure active-peer-table tests
        // (verify_active, heartbeat, disconnect) is safe without a database.
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction does not touch the network");
        SessionManager::new(
            ActivePeerTable::new(max_users),
            PersistenceGateway::new(pool),
        )
    }

    #[test]
    fn verify_active_rejects_unknown_name() {
        let sm = manager(5);
        assert!(matches!(
            sm.verify_active("tok", "alice"),
            Err(TrackerError::BadCredentials)
        ));
    }

    #[test]
    fn verify_active_rejects_token_mismatch() {
        let sm = manager(5);
        sm.peers().add("alice", "tok1", "10.0.0.1", 1052).unwrap();
        assert!(matches!(
            sm.verify_active("wrong", "alice"),
            Err(TrackerError::BadCredentials)
        ));
        assert!(sm.verify_active("tok1", "alice").is_ok());
    }

    #[test]
    fn heartbeat_requires_authentication() {
        let sm = manager(5);
        sm.peers().add("alice", "tok1", "10.0.0.1", 1052).unwrap();
        assert!(sm.heartbeat("tok1", "alice").is_ok());
        assert!(matches!(
            sm.heartbeat("wrong", "alice"),
            Err(TrackerError::BadCredentials)
        ));
    }

    #[test]
    fn disconnect_removes_session_once() {
        let sm = manager(5);
        sm.peers().add("alice", "tok1", "10.0.0.1", 1052).unwrap();
        assert!(sm.disconnect("tok1", "alice").is_ok());
        assert!(matches!(
            sm.disconnect("tok1", "alice"),
            Err(TrackerError::BadCredentials)
        ));
    }
}
