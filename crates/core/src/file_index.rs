//! File Index — register / deregister / list / search / host-lookup,
//! enforcing per-user quotas and de-duplication and filtering query results
//! by current liveness in the [`crate::peers::ActivePeerTable`].
//!
//! This is the central coupling point between the durable catalog (the
//! `user_files` table, reached through [`PersistenceGateway`]) and the
//! ephemeral active-peer table: `search` and `host_lookup` both discard rows
//! whose owner is not currently logged in.

use std::sync::Arc;

use rand::Rng;

use crate::error::{Result, TrackerError};
use crate::peers::ActivePeerTable;
use crate::persistence::models::UserFile;
use crate::persistence::PersistenceGateway;
use crate::session_manager::SessionManager;

/// Upper bound (exclusive) of the `file_id` space.
const FILE_ID_SPACE: i64 = 1_000_000;

/// Attempts to draw a free `file_id` before giving up. At the scale this
/// system targets (≤100 users × ≤10 files against a million-slot space)
/// collisions are rare; this bound exists to keep a degenerate case finite.
const FILE_ID_ISSUE_ATTEMPTS: usize = 32;

/// One row as returned by `List`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFile {
    pub id: i64,
    pub name: String,
    pub file_type: String,
    pub path: String,
    pub size: i64,
}

/// One row as returned by `Search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub id: i64,
    pub name: String,
    pub file_type: String,
    pub size: i64,
}

/// One row as returned by `HostLookup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub ip: String,
    pub port: u16,
    pub path: String,
}

/// The catalog of registered files, gated by the same session
/// authentication every other tracker RPC goes through.
#[derive(Clone)]
pub struct FileIndex {
    storage: Arc<PersistenceGateway>,
    peers: ActivePeerTable,
    max_files_per_user: u32,
}

impl FileIndex {
    pub fn new(storage: Arc<PersistenceGateway>, peers: ActivePeerTable, max_files_per_user: u32) -> Self {
        FileIndex {
            storage,
            peers,
            max_files_per_user,
        }
    }

    async fn issue_file_id(&self) -> Result<i64> {
        for _ in 0..FILE_ID_ISSUE_ATTEMPTS {
            let candidate = rand::rng().random_range(0..FILE_ID_SPACE);
            if !self.storage.file_id_in_use(candidate).await? {
                return Ok(candidate);
            }
        }
        Err(TrackerError::Storage(
            "exhausted file_id issuance attempts without finding a free id".into(),
        ))
    }

    /// `Register(token, name, file_name, file_type, file_path, file_size)`.
    ///
    /// The sequence count → exists → pick-id → insert is not atomic across
    /// awaits; the store's own `UNIQUE (user_name, file_name, file_type,
    /// file_path)` constraint is the backstop against a concurrent duplicate
    /// slipping through, surfaced here as a storage error rather than a
    /// silent double-insert.
    pub async fn register(
        &self,
        sessions: &SessionManager,
        token: &str,
        owner: &str,
        file_name: &str,
        file_type: &str,
        file_path: &str,
        file_size: i64,
    ) -> Result<()> {
        sessions.verify_active(token, owner)?;

        if self.storage.count_files(owner).await? >= self.max_files_per_user {
            return Err(TrackerError::QuotaExceeded);
        }
        if self
            .storage
            .file_exists(owner, file_name, file_type, file_path)
            .await?
        {
            return Err(TrackerError::DuplicateFile);
        }

        let file_id = self.issue_file_id().await?;
        let row = UserFile {
            file_id,
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            file_path: file_path.to_string(),
            file_size,
            user_name: owner.to_string(),
        };
        self.storage.insert_file(&row).await?;
        tracing::info!(owner, file_id, file_name, "file registered");
        Ok(())
    }

    /// `Deregister(token, owner, file_name, file_type, file_path)`.
    pub async fn deregister(
        &self,
        sessions: &SessionManager,
        token: &str,
        owner: &str,
        file_name: &str,
        file_type: &str,
        file_path: &str,
    ) -> Result<()> {
        sessions.verify_active(token, owner)?;
        let removed = self
            .storage
            .delete_file(owner, file_name, file_type, file_path)
            .await?;
        if removed {
            tracing::info!(owner, file_name, "file deregistered");
            Ok(())
        } else {
            Err(TrackerError::Storage(
                "no matching file row to deregister".into(),
            ))
        }
    }

    /// `List(token, owner)`.
    pub async fn list(
        &self,
        sessions: &SessionManager,
        token: &str,
        owner: &str,
    ) -> Result<Vec<OwnedFile>> {
        sessions.verify_active(token, owner)?;
        let rows = self.storage.files_of(owner).await?;
        if rows.is_empty() {
            return Err(TrackerError::NotFound);
        }
        Ok(rows
            .into_iter()
            .map(|r| OwnedFile {
                id: r.file_id,
                name: r.file_name,
                file_type: r.file_type,
                path: r.file_path,
                size: r.file_size,
            })
            .collect())
    }

    /// `Search(token, requester, query)` — the central liveness-filtered
    /// query: results are restricted to owners currently present in the
    /// active peer table, and the requester's own files are always excluded.
    pub async fn search(
        &self,
        sessions: &SessionManager,
        token: &str,
        requester: &str,
        query: &str,
    ) -> Result<Vec<FoundFile>> {
        sessions.verify_active(token, requester)?;
        let rows = self.storage.search_files(requester, query).await?;
        let found: Vec<FoundFile> = rows
            .into_iter()
            .filter(|r| self.peers.is_active(&r.owner_name))
            .map(|r| FoundFile {
                id: r.file_id,
                name: r.file_name,
                file_type: r.file_type,
                size: r.file_size,
            })
            .collect();
        if found.is_empty() {
            Err(TrackerError::NotFound)
        } else {
            Ok(found)
        }
    }

    /// `HostLookup(token, requester, file_id)`.
    pub async fn host_lookup(
        &self,
        sessions: &SessionManager,
        token: &str,
        requester: &str,
        file_id: i64,
    ) -> Result<Vec<Host>> {
        sessions.verify_active(token, requester)?;
        let rows = self.storage.hosts_of(file_id, requester).await?;
        let hosts: Vec<Host> = rows
            .into_iter()
            .filter(|r| self.peers.is_active(&r.owner_name))
            .map(|r| Host {
                ip: r.owner_ip,
                port: r.owner_port as u16,
                path: r.file_path,
            })
            .collect();
        if hosts.is_empty() {
            Err(TrackerError::NotFound)
        } else {
            Ok(hosts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(peers: ActivePeerTable, max_files_per_user: u32) -> FileIndex {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction does not touch the network");
        FileIndex::new(PersistenceGateway::new(pool), peers, max_files_per_user)
    }

    #[test]
    fn file_id_space_is_one_million_slots() {
        assert_eq!(FILE_ID_SPACE, 1_000_000);
    }

    #[tokio::test]
    async fn register_requires_active_session() {
        let peers = ActivePeerTable::new(5);
        let sessions = SessionManager::new(peers.clone(), PersistenceGateway::new(
            sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
        ));
        let idx = index(peers, 10);
        let err = idx
            .register(&sessions, "tok", "alice", "report", "pdf", "/home/a/", 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::BadCredentials));
    }
}
