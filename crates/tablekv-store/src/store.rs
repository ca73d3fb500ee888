//! KvStore — namespaced key-value persistence over a relational backend.
//!
//! Each namespace is one table with an `id` primary key and a JSON `data`
//! column. Namespace tables are created lazily on first write. Every backend
//! round-trip runs under the configured operation timeout; when it expires the
//! in-flight future is dropped, which cancels the call and returns the
//! connection to the pool.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{AnyPool, Row};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};
use crate::namespace::{Namespace, validate_key};

/// Namespaced key-value store backed by a pooled SQL connection.
///
/// Cloning is cheap and every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct KvStore {
    pool: AnyPool,
    dialect: Dialect,
    /// Scopes namespace listing on MySQL.
    database: Option<String>,
    op_timeout: Duration,
}

impl KvStore {
    /// Open the connection pool described by `config`.
    ///
    /// At least one connection is established before returning, so an
    /// unreachable backend fails here rather than on first use.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        install_default_drivers();
        let url = config.connection_url()?;
        let pool_cfg = &config.pool;
        let pool = AnyPoolOptions::new()
            .max_connections(pool_cfg.max_connections)
            .min_connections(pool_cfg.min_connections)
            .max_lifetime(Duration::from_secs(pool_cfg.max_lifetime_secs))
            .idle_timeout(Duration::from_secs(pool_cfg.idle_timeout_secs))
            .acquire_timeout(Duration::from_secs(pool_cfg.acquire_timeout_secs))
            .connect(url.as_str())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let dialect = config.dialect();
        info!(
            ?dialect,
            max_connections = pool_cfg.max_connections,
            "store connected"
        );
        Ok(Self {
            pool,
            dialect,
            database: config.database_name().map(str::to_string),
            op_timeout: config.operation_timeout(),
        })
    }

    /// Connect to MySQL with default pool settings.
    pub async fn connect_mysql(
        host: &str,
        database: &str,
        user: &str,
        password: &str,
    ) -> StoreResult<Self> {
        Self::connect(&StoreConfig::mysql(host, database, user, password)).await
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    ///
    /// Closes the pool for every clone of this store.
    pub async fn shutdown(self) -> StoreResult<()> {
        if tokio::time::timeout(self.op_timeout, self.pool.close())
            .await
            .is_err()
        {
            warn!(after = ?self.op_timeout, "connection pool did not close in time");
            return Err(StoreError::Timeout {
                op: "shutdown",
                after: self.op_timeout,
            });
        }
        info!("store disconnected");
        Ok(())
    }

    // ── Namespaces ─────────────────────────────────────────────────

    /// Create the namespace table if it does not exist yet.
    pub async fn create_namespace(&self, namespace: &str) -> StoreResult<()> {
        let ns = Namespace::parse(namespace)?;
        self.ensure_namespace(&ns).await?;
        debug!(%ns, "namespace ready");
        Ok(())
    }

    /// Names of all namespace tables, sorted.
    pub async fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        let mut query = sqlx::query_scalar::<_, String>(self.dialect.list_tables());
        if self.dialect.binds_database_name() {
            query = query.bind(self.database.clone().unwrap_or_default());
        }
        self.timed("list_namespaces", query.fetch_all(&self.pool))
            .await?
            .map_err(|e| self.backend_error("list_namespaces", e))
    }

    /// Drop the namespace table and every record in it.
    pub async fn drop_namespace(&self, namespace: &str) -> StoreResult<()> {
        let ns = Namespace::parse(namespace)?;
        let stmt = self.dialect.drop_table(&ns);
        match self
            .timed("drop_namespace", sqlx::query(&stmt).execute(&self.pool))
            .await?
        {
            Ok(_) => {
                debug!(%ns, "namespace dropped");
                Ok(())
            }
            Err(e) if self.dialect.is_missing_table(&e) => Err(StoreError::NamespaceNotFound {
                namespace: ns.to_string(),
                message: "namespace does not exist".to_string(),
            }),
            Err(e) => Err(self.backend_error("drop_namespace", e)),
        }
    }

    async fn ensure_namespace(&self, ns: &Namespace) -> StoreResult<()> {
        let stmt = self.dialect.create_table(ns);
        self.timed("create_namespace", sqlx::query(&stmt).execute(&self.pool))
            .await?
            .map(|_| ())
            .map_err(|e| {
                warn!(%ns, error = %e, "error creating namespace table");
                StoreError::NamespaceNotFound {
                    namespace: ns.to_string(),
                    message: e.to_string(),
                }
            })
    }

    // ── Records ────────────────────────────────────────────────────

    /// Store `value` under `key`, creating the namespace if needed.
    ///
    /// With `allow_overwrite` false an existing key fails with
    /// [`StoreError::ItemConflict`] and nothing is written. The check is the
    /// backend's primary-key constraint, so concurrent writers to one new key
    /// see exactly one success.
    pub async fn upsert(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        allow_overwrite: bool,
    ) -> StoreResult<()> {
        let ns = Namespace::parse(namespace)?;
        validate_key(key)?;
        let data = std::str::from_utf8(value)
            .map_err(|e| StoreError::InvalidValue(e.to_string()))?
            .to_string();
        self.ensure_namespace(&ns).await?;

        if allow_overwrite {
            let stmt = self.dialect.upsert(&ns);
            let query = sqlx::query(&stmt)
                .bind(key.to_string())
                .bind(data.clone())
                .bind(data);
            self.timed("upsert", query.execute(&self.pool))
                .await?
                .map_err(|e| self.backend_error("upsert", e))?;
        } else {
            let stmt = self.dialect.insert(&ns);
            let query = sqlx::query(&stmt).bind(key.to_string()).bind(data);
            match self.timed("upsert", query.execute(&self.pool)).await? {
                Ok(_) => {}
                Err(e) if self.dialect.is_duplicate_key(&e) => {
                    return Err(StoreError::ItemConflict {
                        namespace: ns.to_string(),
                        key: key.to_string(),
                    });
                }
                Err(e) => return Err(self.backend_error("upsert", e)),
            }
        }
        debug!(%ns, key, allow_overwrite, "record stored");
        Ok(())
    }

    /// Serialize `value` as JSON and store it.
    pub async fn upsert_json<T: Serialize + ?Sized>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        allow_overwrite: bool,
    ) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::InvalidValue(e.to_string()))?;
        self.upsert(namespace, key, &bytes, allow_overwrite).await
    }

    /// Fetch the value stored under `key`.
    pub async fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        let ns = Namespace::parse(namespace)?;
        let not_found = || StoreError::IdNotFound {
            namespace: ns.to_string(),
            key: key.to_string(),
        };
        if validate_key(key).is_err() {
            // No such key can have been stored.
            return Err(not_found());
        }

        let stmt = self.dialect.get(&ns);
        let query = sqlx::query(&stmt).bind(key.to_string());
        let row = match self.timed("get", query.fetch_optional(&self.pool)).await? {
            Ok(row) => row,
            Err(e) if self.dialect.is_missing_table(&e) => None,
            Err(e) => return Err(self.backend_error("get", e)),
        };
        let row = row.ok_or_else(not_found)?;
        let data: String = row
            .try_get(0)
            .map_err(|e| self.backend_error("get", e))?;
        Ok(data.into_bytes())
    }

    /// Fetch and deserialize the JSON value stored under `key`.
    pub async fn get_json<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> StoreResult<T> {
        let bytes = self.get(namespace, key).await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::internal("get_json", e))
    }

    /// Every record in the namespace, ordered by key.
    pub async fn get_all(&self, namespace: &str) -> StoreResult<BTreeMap<String, Vec<u8>>> {
        let ns = Namespace::parse(namespace)?;
        let stmt = self.dialect.get_all(&ns);
        let rows = match self
            .timed("get_all", sqlx::query(&stmt).fetch_all(&self.pool))
            .await?
        {
            Ok(rows) => rows,
            Err(e) if self.dialect.is_missing_table(&e) => Vec::new(),
            Err(e) => return Err(self.backend_error("get_all", e)),
        };

        let mut records = BTreeMap::new();
        for row in rows {
            let id: String = row
                .try_get(0)
                .map_err(|e| self.backend_error("get_all", e))?;
            let data: String = row
                .try_get(1)
                .map_err(|e| self.backend_error("get_all", e))?;
            records.insert(id, data.into_bytes());
        }
        Ok(records)
    }

    /// Whether a record exists under `key`.
    pub async fn contains(&self, namespace: &str, key: &str) -> StoreResult<bool> {
        let ns = Namespace::parse(namespace)?;
        if validate_key(key).is_err() {
            return Ok(false);
        }
        let stmt = self.dialect.count_key(&ns);
        let query = sqlx::query_scalar::<_, i64>(&stmt).bind(key.to_string());
        match self.timed("contains", query.fetch_one(&self.pool)).await? {
            Ok(count) => Ok(count > 0),
            Err(e) if self.dialect.is_missing_table(&e) => Ok(false),
            Err(e) => Err(self.backend_error("contains", e)),
        }
    }

    /// Remove the record under `key`. Missing keys are not an error.
    pub async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let ns = Namespace::parse(namespace)?;
        if validate_key(key).is_err() {
            return Ok(());
        }
        let stmt = self.dialect.delete(&ns);
        let query = sqlx::query(&stmt).bind(key.to_string());
        match self.timed("delete", query.execute(&self.pool)).await? {
            Ok(result) => {
                debug!(%ns, key, removed = result.rows_affected(), "record deleted");
                Ok(())
            }
            Err(e) if self.dialect.is_missing_table(&e) => Ok(()),
            Err(e) => Err(self.backend_error("delete", e)),
        }
    }

    /// Remove every record in the namespace, keeping the table.
    pub async fn delete_all(&self, namespace: &str) -> StoreResult<()> {
        let ns = Namespace::parse(namespace)?;
        let stmt = self.dialect.delete_all(&ns);
        match self
            .timed("delete_all", sqlx::query(&stmt).execute(&self.pool))
            .await?
        {
            Ok(_) => {
                debug!(%ns, "namespace cleared");
                Ok(())
            }
            Err(e) if self.dialect.is_missing_table(&e) => Ok(()),
            Err(e) => Err(self.backend_error("delete_all", e)),
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    async fn timed<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> StoreResult<Result<T, sqlx::Error>> {
        with_timeout(op, self.op_timeout, fut).await
    }

    fn backend_error(&self, op: &'static str, err: sqlx::Error) -> StoreError {
        warn!(op, error = %err, "backend statement failed");
        StoreError::internal(op, err)
    }
}

/// Bound `fut` by `limit`. The outer result carries the timeout; the inner
/// one is the driver's own outcome.
async fn with_timeout<T, E>(
    op: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> StoreResult<Result<T, E>> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(op, after = ?limit, "backend call timed out");
        StoreError::Timeout { op, after: limit }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn with_timeout_passes_through_results() {
        let ok = with_timeout("get", Duration::from_secs(1), async { Ok::<_, String>(7) })
            .await
            .unwrap();
        assert_eq!(ok, Ok(7));

        let inner_err = with_timeout("get", Duration::from_secs(1), async {
            Err::<u8, _>("boom".to_string())
        })
        .await
        .unwrap();
        assert_eq!(inner_err, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn with_timeout_reports_timeout_kind() {
        let err = with_timeout(
            "upsert",
            Duration::from_millis(20),
            std::future::pending::<Result<(), String>>(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().starts_with("upsert timed out"));
    }
}
