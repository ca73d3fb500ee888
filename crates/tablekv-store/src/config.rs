//! tablekv.toml configuration parser.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};

const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    /// Bound on every backend round-trip, in seconds.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

/// Which relational engine to talk to.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Mysql {
        /// `host` or `host:port`.
        host: String,
        database: String,
        user: String,
        #[serde(default)]
        password: String,
    },
    Sqlite {
        path: PathBuf,
    },
}

/// Connection pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum open connections (default: 100).
    pub max_connections: u32,
    /// Connections kept open while idle (default: 10).
    pub min_connections: u32,
    /// Connections older than this are closed (default: 3600s).
    pub max_lifetime_secs: u64,
    /// Idle connections above `min_connections` are closed after this (default: 600s).
    pub idle_timeout_secs: u64,
    /// Maximum wait for a pooled connection (default: 10s).
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            min_connections: 10,
            max_lifetime_secs: 3600,
            idle_timeout_secs: 600,
            acquire_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }
}

fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl StoreConfig {
    /// MySQL config with default pool settings.
    pub fn mysql(host: &str, database: &str, user: &str, password: &str) -> Self {
        Self {
            backend: BackendConfig::Mysql {
                host: host.to_string(),
                database: database.to_string(),
                user: user.to_string(),
                password: password.to_string(),
            },
            pool: PoolConfig::default(),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }

    /// SQLite config for a database file, created if missing.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::Sqlite { path: path.into() },
            pool: PoolConfig::default(),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }

    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    fn validate(&self) -> StoreResult<()> {
        if self.pool.max_connections == 0 {
            return Err(StoreError::Config(
                "pool.max_connections must be at least 1".to_string(),
            ));
        }
        if self.pool.min_connections > self.pool.max_connections {
            return Err(StoreError::Config(format!(
                "pool.min_connections ({}) exceeds pool.max_connections ({})",
                self.pool.min_connections, self.pool.max_connections
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(StoreError::Config(
                "operation_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dialect(&self) -> Dialect {
        match self.backend {
            BackendConfig::Mysql { .. } => Dialect::MySql,
            BackendConfig::Sqlite { .. } => Dialect::Sqlite,
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Database name used to scope namespace listing (MySQL only).
    pub fn database_name(&self) -> Option<&str> {
        match &self.backend {
            BackendConfig::Mysql { database, .. } => Some(database),
            BackendConfig::Sqlite { .. } => None,
        }
    }

    /// Build the driver connection URL. Credentials are percent-encoded.
    pub fn connection_url(&self) -> StoreResult<Url> {
        match &self.backend {
            BackendConfig::Mysql {
                host,
                database,
                user,
                password,
            } => {
                let (hostname, port) = split_host_port(host)?;
                let mut url = Url::parse("mysql://localhost")
                    .map_err(|e| StoreError::Config(e.to_string()))?;
                url.set_host(Some(hostname))
                    .map_err(|e| StoreError::Config(format!("host {hostname:?}: {e}")))?;
                url.set_port(port)
                    .map_err(|_| StoreError::Config(format!("cannot set port on {host:?}")))?;
                url.set_username(user)
                    .map_err(|_| StoreError::Config(format!("cannot set user {user:?}")))?;
                if !password.is_empty() {
                    url.set_password(Some(password))
                        .map_err(|_| StoreError::Config("cannot set password".to_string()))?;
                }
                url.set_path(database);
                Ok(url)
            }
            BackendConfig::Sqlite { path } => {
                let raw = format!("sqlite://{}?mode=rwc", path.display());
                Url::parse(&raw).map_err(|e| StoreError::Config(format!("{raw}: {e}")))
            }
        }
    }
}

fn split_host_port(host: &str) -> StoreResult<(&str, Option<u16>)> {
    match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| StoreError::Config(format!("port in {host:?}: {e}")))?;
            Ok((name, Some(port)))
        }
        None => Ok((host, None)),
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::Mysql {
                host,
                database,
                user,
                ..
            } => f
                .debug_struct("Mysql")
                .field("host", host)
                .field("database", database)
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            BackendConfig::Sqlite { path } => {
                f.debug_struct("Sqlite").field("path", path).finish()
            }
        }
    }
}
