pub mod namespaces;
pub mod records;

use tablekv_store::StoreError;

/// Prefix the stable error code so scripts can match on it.
pub fn coded(err: StoreError) -> anyhow::Error {
    anyhow::anyhow!("{}: {err}", err.kind())
}
