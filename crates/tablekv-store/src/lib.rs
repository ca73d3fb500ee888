//! tablekv-store — namespaced key-value storage over a relational engine.
//!
//! Each namespace maps to one table with a fixed two-column schema (`id`
//! primary key, JSON `data` payload). Tables are created lazily on the first
//! write to a namespace and removed with [`KvStore::drop_namespace`].
//!
//! # Architecture
//!
//! The [`KvStore`] owns a `sqlx` connection pool and is `Clone` + `Send` +
//! `Sync`; construct it once at startup and pass it to call sites. MySQL is
//! the primary backend and SQLite is supported for embedded use and tests.
//! Statement text per backend lives in [`Dialect`].
//!
//! Namespace names are interpolated into SQL as table identifiers, so they
//! are validated against `[A-Za-z_][A-Za-z0-9_]{0,63}` first. All other
//! inputs are bound as parameters.

pub mod config;
pub mod dialect;
pub mod error;
pub mod namespace;
pub mod store;

pub use config::{BackendConfig, PoolConfig, StoreConfig};
pub use dialect::Dialect;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use namespace::Namespace;
pub use store::KvStore;
