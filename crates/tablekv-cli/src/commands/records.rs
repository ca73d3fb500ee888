use std::collections::BTreeMap;
use std::io::Read;

use anyhow::Context;
use serde_json::{Map, Value};
use tablekv_store::KvStore;

use super::coded;

pub async fn put(
    store: &KvStore,
    namespace: &str,
    key: &str,
    value: &str,
    allow_overwrite: bool,
) -> anyhow::Result<()> {
    let value = read_value(value, std::io::stdin()).context("reading value from stdin")?;
    store
        .upsert(namespace, key, value.as_bytes(), allow_overwrite)
        .await
        .map_err(coded)?;
    println!("✓ Stored {namespace}/{key}");
    Ok(())
}

pub async fn get(store: &KvStore, namespace: &str, key: &str) -> anyhow::Result<()> {
    let value = store.get(namespace, key).await.map_err(coded)?;
    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}

pub async fn get_all(store: &KvStore, namespace: &str) -> anyhow::Result<()> {
    let records = store.get_all(namespace).await.map_err(coded)?;
    println!("{}", serde_json::to_string_pretty(&records_to_json(&records))?);
    Ok(())
}

pub async fn exists(store: &KvStore, namespace: &str, key: &str) -> anyhow::Result<()> {
    let found = store.contains(namespace, key).await.map_err(coded)?;
    println!("{found}");
    Ok(())
}

pub async fn delete(store: &KvStore, namespace: &str, key: &str) -> anyhow::Result<()> {
    store.delete(namespace, key).await.map_err(coded)?;
    println!("✓ Deleted {namespace}/{key}");
    Ok(())
}

pub async fn delete_all(store: &KvStore, namespace: &str) -> anyhow::Result<()> {
    store.delete_all(namespace).await.map_err(coded)?;
    println!("✓ Cleared {namespace}");
    Ok(())
}

/// Resolve the value argument. `-` reads from `input` and drops the trailing
/// newline a shell pipe leaves; any other argument is stored byte for byte.
fn read_value(arg: &str, mut input: impl Read) -> std::io::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    input.read_to_string(&mut buf)?;
    buf.truncate(buf.trim_end().len());
    Ok(buf)
}

/// Render records as one JSON object. Stored values that are not valid
/// JSON are emitted as strings.
fn records_to_json(records: &BTreeMap<String, Vec<u8>>) -> Value {
    let object: Map<String, Value> = records
        .iter()
        .map(|(key, raw)| {
            let value = serde_json::from_slice(raw)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()));
            (key.clone(), value)
        })
        .collect();
    Value::Object(object)
}
