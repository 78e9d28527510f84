//! The persistence gateway — the tracker's only path to the relational
//! store.
//!
//! Every method is a single parameterized query or a short bounded sequence
//! of them; none span a transaction across an RPC boundary (the one known
//! exception, file registration's count-then-insert race, is documented on
//! [`crate::file_index`]). All methods acquire a process-wide gate before
//! touching the pool: `sqlx::PgPool` is itself safely concurrent, but
//! storage access is deliberately serialized one operation at a time, and
//! this gate is how that guarantee is made visible.

pub mod models;

use crate::error::{Result, TrackerError};
use models::{FileWithOwner, User, UserFile};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Guards access to the relational store.
pub struct PersistenceGateway {
    pool: PgPool,
    gate: Mutex<()>,
    healthy: AtomicBool,
}

impl PersistenceGateway {
    /// Wrap an already-established connection pool.
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(PersistenceGateway {
            pool,
            gate: Mutex::new(()),
            healthy: AtomicBool::new(true),
        })
    }

    /// Whether the last health probe (or the last live query) succeeded.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn guard<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(PgPool) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        if !self.is_healthy() {
            return Err(TrackerError::StorageUnavailable);
        }
        let _permit = self.gate.lock().await;
        match op(self.pool.clone()).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(error = %e, "storage operation failed");
                Err(TrackerError::Storage(e.to_string()))
            }
        }
    }

    pub async fn fetch_user(&self, name: &str) -> Result<Option<User>> {
        let name = name.to_string();
        self.guard(|pool| async move {
            sqlx::query_as::<_, User>(
                "SELECT user_name, user_password, user_ip, user_port FROM users WHERE user_name = $1",
            )
            .bind(name)
            .fetch_optional(&pool)
            .await
        })
        .await
    }

    pub async fn insert_user(&self, name: &str, password: &str, ip: &str, port: u16) -> Result<()> {
        let (name, password, ip) = (name.to_string(), password.to_string(), ip.to_string());
        self.guard(|pool| async move {
            sqlx::query(
                "INSERT INTO users (user_name, user_password, user_ip, user_port) VALUES ($1, $2, $3, $4)",
            )
            .bind(name)
            .bind(password)
            .bind(ip)
            .bind(port as i32)
            .execute(&pool)
            .await
            .map(|_| ())
        })
        .await
    }

    pub async fn update_user_ip(&self, name: &str, ip: &str) -> Result<()> {
        let (name, ip) = (name.to_string(), ip.to_string());
        self.guard(|pool| async move {
            sqlx::query("UPDATE users SET user_ip = $1 WHERE user_name = $2")
                .bind(ip)
                .bind(name)
                .execute(&pool)
                .await
                .map(|_| ())
        })
        .await
    }

    pub async fn update_user_port(&self, name: &str, port: u16) -> Result<()> {
        let name = name.to_string();
        self.guard(|pool| async move {
            sqlx::query("UPDATE users SET user_port = $1 WHERE user_name = $2")
                .bind(port as i32)
                .bind(name)
                .execute(&pool)
                .await
                .map(|_| ())
        })
        .await
    }

    pub async fn count_files(&self, owner: &str) -> Result<u32> {
        let owner = owner.to_string();
        self.guard(|pool| async move {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_files WHERE user_name = $1")
                .bind(owner)
                .fetch_one(&pool)
                .await?;
            Ok(count as u32)
        })
        .await
    }

    pub async fn file_exists(&self, owner: &str, name: &str, file_type: &str, path: &str) -> Result<bool> {
        let (owner, name, file_type, path) =
            (owner.to_string(), name.to_string(), file_type.to_string(), path.to_string());
        self.guard(|pool| async move {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM user_files WHERE user_name = $1 AND file_name = $2 AND file_type = $3 AND file_path = $4",
            )
            .bind(owner)
            .bind(name)
            .bind(file_type)
            .bind(path)
            .fetch_one(&pool)
            .await?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn file_id_in_use(&self, id: i64) -> Result<bool> {
        self.guard(|pool| async move {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_files WHERE file_id = $1")
                .bind(id)
                .fetch_one(&pool)
                .await?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn insert_file(&self, row: &UserFile) -> Result<()> {
        let row = row.clone();
        self.guard(|pool| async move {
            sqlx::query(
                "INSERT INTO user_files (file_id, file_name, file_type, file_path, file_size, user_name) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(row.file_id)
            .bind(row.file_name)
            .bind(row.file_type)
            .bind(row.file_path)
            .bind(row.file_size)
            .bind(row.user_name)
            .execute(&pool)
            .await
            .map(|_| ())
        })
        .await
    }

    pub async fn delete_file(&self, owner: &str, name: &str, file_type: &str, path: &str) -> Result<bool> {
        let (owner, name, file_type, path) =
            (owner.to_string(), name.to_string(), file_type.to_string(), path.to_string());
        self.guard(|pool| async move {
            let result = sqlx::query(
                "DELETE FROM user_files WHERE user_name = $1 AND file_name = $2 AND file_type = $3 AND file_path = $4",
            )
            .bind(owner)
            .bind(name)
            .bind(file_type)
            .bind(path)
            .execute(&pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    pub async fn files_of(&self, owner: &str) -> Result<Vec<UserFile>> {
        let owner = owner.to_string();
        self.guard(|pool| async move {
            sqlx::query_as::<_, UserFile>(
                "SELECT file_id, file_name, file_type, file_path, file_size, user_name FROM user_files WHERE user_name = $1",
            )
            .bind(owner)
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Rows matching `query` (case-insensitive substring of `name ∥ type`),
    /// excluding `owner_excluded`'s own files. Liveness filtering happens one
    /// layer up, in [`crate::file_index`].
    pub async fn search_files(&self, owner_excluded: &str, query: &str) -> Result<Vec<FileWithOwner>> {
        let (owner_excluded, pattern) = (owner_excluded.to_string(), format!("%{}%", query));
        self.guard(|pool| async move {
            sqlx::query_as::<_, FileWithOwner>(
                "SELECT f.file_id, f.file_name, f.file_type, f.file_path, f.file_size, \
                 u.user_name AS owner_name, u.user_ip AS owner_ip, u.user_port AS owner_port \
                 FROM user_files f JOIN users u ON u.user_name = f.user_name \
                 WHERE f.user_name <> $1 AND (f.file_name || f.file_type) ILIKE $2",
            )
            .bind(owner_excluded)
            .bind(pattern)
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Rows for `file_id`, excluding `requester_excluded`'s own files.
    pub async fn hosts_of(&self, file_id: i64, requester_excluded: &str) -> Result<Vec<FileWithOwner>> {
        let requester_excluded = requester_excluded.to_string();
        self.guard(|pool| async move {
            sqlx::query_as::<_, FileWithOwner>(
                "SELECT f.file_id, f.file_name, f.file_type, f.file_path, f.file_size, \
                 u.user_name AS owner_name, u.user_ip AS owner_ip, u.user_port AS owner_port \
                 FROM user_files f JOIN users u ON u.user_name = f.user_name \
                 WHERE f.file_id = $1 AND f.user_name <> $2",
            )
            .bind(file_id)
            .bind(requester_excluded)
            .fetch_all(&pool)
            .await
        })
        .await
    }
}

/// Spawn the background connection-health probe.
///
/// Every `interval`, issues a trivial query; on failure, flips the gateway
/// unhealthy so in-flight RPCs fail fast with `STORAGE_UNAVAILABLE` instead
/// of hanging on a dead connection. `sqlx::PgPool` reconnects its own
/// sockets transparently, so recovery is just the next successful probe.
pub fn spawn_health_probe(gateway: Arc<PersistenceGateway>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match sqlx::query("SELECT 1").execute(&gateway.pool).await {
                Ok(_) => {
                    if !gateway.healthy.swap(true, Ordering::SeqCst) {
                        tracing::info!("storage connection re-established");
                    }
                }
                Err(e) => {
                    if gateway.healthy.swap(false, Ordering::SeqCst) {
                        tracing::error!(error = %e, "storage connection lost");
                    }
                }
            }
        }
    })
}
