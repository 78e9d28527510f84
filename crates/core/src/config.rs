//! Tracker configuration, loaded from a TOML file with environment overrides.
//!
//! Mirrors the retrieval pack's convention (see the `wg-quickrs` example) of a
//! typed, serde-derived config struct that a CLI layer loads once at startup
//! and hands down to every subsystem.

use serde::Deserialize;
use std::path::Path;

/// Storage connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Connection string for the relational store, e.g. `postgres://host/db`.
    pub storage_url: String,
    /// Database role used to authenticate.
    pub storage_user: String,
    /// Database password. Prefer the `TRACKER_STORAGE_PASSWORD` environment
    /// variable over checking this into a config file.
    #[serde(default)]
    pub storage_password: String,
}

/// Session and quota limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of simultaneously active peer sessions, `1..=100`.
    pub max_users: u16,
    /// Maximum number of registered files per user.
    #[serde(default = "default_max_files_per_user")]
    pub max_files_per_user: u32,
}

fn default_max_files_per_user() -> u32 {
    10
}

/// Network bind addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Address the tracker RPC listener binds to.
    pub rpc_bind: String,
    /// Address this peer's transfer listener binds to (peer process only).
    #[serde(default)]
    pub peer_bind: Option<String>,
}

/// Top-level tracker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub network: NetworkConfig,
}

/// Errors encountered while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("max_users must be between 1 and 100, got {0}")]
    MaxUsersOutOfRange(u16),
    #[error("storage_url must not exceed 200 characters")]
    StorageUrlTooLong,
    #[error("storage_user must not exceed 100 characters")]
    StorageUserTooLong,
    #[error("storage_password must not exceed 100 characters")]
    StoragePasswordTooLong,
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// `TRACKER_STORAGE_PASSWORD` always wins over the file contents, so
    /// secrets never need to live on disk in plaintext.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if let Ok(password) = std::env::var("TRACKER_STORAGE_PASSWORD") {
            config.storage.storage_password = password;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.limits.max_users) {
            return Err(ConfigError::MaxUsersOutOfRange(self.limits.max_users));
        }
        if self.storage.storage_url.len() > 200 {
            return Err(ConfigError::StorageUrlTooLong);
        }
        if self.storage.storage_user.len() > 100 {
            return Err(ConfigError::StorageUserTooLong);
        }
        if self.storage.storage_password.len() > 100 {
            return Err(ConfigError::StoragePasswordTooLong);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_max_users_out_of_range() {
        let cfg = Config {
            storage: StorageConfig {
                storage_url: "postgres://localhost/tracker".into(),
                storage_user: "tracker".into(),
                storage_password: String::new(),
            },
            limits: LimitsConfig {
                max_users: 0,
                max_files_per_user: 10,
            },
            network: NetworkConfig {
                rpc_bind: "0.0.0.0:9000".into(),
                peer_bind: None,
            },
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MaxUsersOutOfRange(0))
        ));
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = std::env::temp_dir().join(format!(
            "tracker-config-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
            [storage]
            storage_url = "postgres://localhost/tracker"
            storage_user = "tracker"
            storage_password = "from-file"

            [limits]
            max_users = 10

            [network]
            rpc_bind = "0.0.0.0:9000"
            "#,
        )
        .unwrap();

        unsafe {
            std::env::set_var("TRACKER_STORAGE_PASSWORD", "from-env");
        }
        let config = Config::load(&path).unwrap();
        unsafe {
            std::env::remove_var("TRACKER_STORAGE_PASSWORD");
        }
        assert_eq!(config.storage.storage_password, "from-env");
        assert_eq!(config.limits.max_files_per_user, 10);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
