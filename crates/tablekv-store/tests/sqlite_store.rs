//! KvStore behaviour against a real SQLite database file.
//!
//! Each test opens its own database inside a temporary directory, so tests
//! can run in parallel without sharing state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tablekv_store::{ErrorKind, KvStore, StoreConfig};
use tempfile::TempDir;

async fn open_store() -> (KvStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::sqlite(dir.path().join("kv.db"));
    config.pool.max_connections = 4;
    config.pool.min_connections = 0;
    let store = KvStore::connect(&config).await.unwrap();
    (store, dir)
}

// ── Upsert / Get ───────────────────────────────────────────────────

#[tokio::test]
async fn upsert_creates_namespace_implicitly() {
    let (store, _dir) = open_store().await;
    assert!(store.list_namespaces().await.unwrap().is_empty());

    store.upsert("fresh", "k1", br#"{"v":1}"#, true).await.unwrap();

    assert_eq!(store.list_namespaces().await.unwrap(), vec!["fresh"]);
    assert_eq!(store.get("fresh", "k1").await.unwrap(), br#"{"v":1}"#);
}

#[tokio::test]
async fn upsert_with_overwrite_replaces_value() {
    let (store, _dir) = open_store().await;
    store.upsert("items", "k", br#"{"v":1}"#, true).await.unwrap();
    store.upsert("items", "k", br#"{"v":2}"#, true).await.unwrap();

    assert_eq!(store.get("items", "k").await.unwrap(), br#"{"v":2}"#);
    assert_eq!(store.get_all("items").await.unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_without_overwrite_conflicts_and_keeps_value() {
    let (store, _dir) = open_store().await;
    store.upsert("items", "k", br#"{"v":1}"#, false).await.unwrap();

    let err = store
        .upsert("items", "k", br#"{"v":2}"#, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ItemConflict);
    assert_eq!(store.get("items", "k").await.unwrap(), br#"{"v":1}"#);
}

#[tokio::test]
async fn get_missing_key_or_namespace_is_id_not_found() {
    let (store, _dir) = open_store().await;
    store.create_namespace("items").await.unwrap();

    let err = store.get("items", "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdNotFound);

    let err = store.get("never_created", "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdNotFound);
    // Reads never create tables.
    assert_eq!(store.list_namespaces().await.unwrap(), vec!["items"]);
}

#[tokio::test]
async fn users_scenario() {
    let (store, _dir) = open_store().await;
    store.create_namespace("users").await.unwrap();
    store
        .upsert("users", "u1", br#"{"name":"Ann"}"#, true)
        .await
        .unwrap();
    assert_eq!(store.get("users", "u1").await.unwrap(), br#"{"name":"Ann"}"#);

    store.delete("users", "u1").await.unwrap();
    let err = store.get("users", "u1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdNotFound);
}

// ── GetAll / Delete / DeleteAll ────────────────────────────────────

#[tokio::test]
async fn get_all_is_ordered_by_key() {
    let (store, _dir) = open_store().await;
    for key in ["b", "a", "c"] {
        let value = format!(r#"{{"key":"{key}"}}"#);
        store.upsert("letters", key, value.as_bytes(), true).await.unwrap();
    }

    let all = store.get_all("letters").await.unwrap();
    let keys: Vec<&str> = all.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert_eq!(all["b"], br#"{"key":"b"}"#);
}

#[tokio::test]
async fn get_all_on_empty_or_missing_namespace_is_empty() {
    let (store, _dir) = open_store().await;
    store.create_namespace("empty").await.unwrap();

    assert!(store.get_all("empty").await.unwrap().is_empty());
    assert!(store.get_all("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (store, _dir) = open_store().await;
    store.upsert("items", "k", b"1", true).await.unwrap();

    store.delete("items", "k").await.unwrap();
    store.delete("items", "k").await.unwrap();
    store.delete("items", "never").await.unwrap();
    store.delete("missing", "k").await.unwrap();
    assert!(!store.contains("items", "k").await.unwrap());
}

#[tokio::test]
async fn delete_all_clears_namespace_but_keeps_it() {
    let (store, _dir) = open_store().await;
    for key in ["a", "b", "c"] {
        store.upsert("items", key, b"true", true).await.unwrap();
    }
    store.upsert("other", "a", b"true", true).await.unwrap();

    store.delete_all("items").await.unwrap();

    assert!(store.get_all("items").await.unwrap().is_empty());
    assert_eq!(store.get_all("other").await.unwrap().len(), 1);
    assert_eq!(store.list_namespaces().await.unwrap(), vec!["items", "other"]);
    store.delete_all("missing").await.unwrap();
}

#[tokio::test]
async fn contains_tracks_existence() {
    let (store, _dir) = open_store().await;
    assert!(!store.contains("items", "k").await.unwrap());

    store.upsert("items", "k", b"null", true).await.unwrap();
    assert!(store.contains("items", "k").await.unwrap());
    assert!(!store.contains("items", "other").await.unwrap());
}

// ── Namespaces ─────────────────────────────────────────────────────

#[tokio::test]
async fn create_namespace_is_idempotent() {
    let (store, _dir) = open_store().await;
    store.create_namespace("users").await.unwrap();
    store.upsert("users", "u1", b"{}", true).await.unwrap();
    store.create_namespace("users").await.unwrap();

    assert_eq!(store.get("users", "u1").await.unwrap(), b"{}");
}

#[tokio::test]
async fn list_namespaces_is_sorted() {
    let (store, _dir) = open_store().await;
    for ns in ["zeta", "alpha", "mid"] {
        store.create_namespace(ns).await.unwrap();
    }
    assert_eq!(
        store.list_namespaces().await.unwrap(),
        vec!["alpha", "mid", "zeta"]
    );
}

#[tokio::test]
async fn drop_namespace_removes_table_and_records() {
    let (store, _dir) = open_store().await;
    store.upsert("temp", "k", b"1", true).await.unwrap();
    store.create_namespace("keep").await.unwrap();

    store.drop_namespace("temp").await.unwrap();

    assert_eq!(store.list_namespaces().await.unwrap(), vec!["keep"]);
    assert_eq!(
        store.get("temp", "k").await.unwrap_err().kind(),
        ErrorKind::IdNotFound
    );

    let err = store.drop_namespace("temp").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
}

// ── Validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn hostile_namespace_names_never_reach_the_backend() {
    let (store, _dir) = open_store().await;
    store.upsert("victim", "k", b"1", true).await.unwrap();

    let hostile = "victim; DROP TABLE victim";
    for err in [
        store.upsert(hostile, "k", b"1", true).await.unwrap_err(),
        store.get(hostile, "k").await.unwrap_err(),
        store.delete_all(hostile).await.unwrap_err(),
        store.drop_namespace(hostile).await.unwrap_err(),
        store.create_namespace("sqlite_master").await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::InvalidNamespace);
    }
    assert_eq!(store.get("victim", "k").await.unwrap(), b"1");
}

#[tokio::test]
async fn keys_and_values_are_validated_on_write() {
    let (store, _dir) = open_store().await;

    let err = store
        .upsert("items", "fifteen-chars-k", b"1", true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidKey);

    let err = store.upsert("items", "k", &[0xff, 0xfe], true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);

    // Quotes in keys are bound, not interpolated.
    store.upsert("items", "it's", b"1", true).await.unwrap();
    assert_eq!(store.get("items", "it's").await.unwrap(), b"1");
}

#[tokio::test]
async fn reserved_word_namespaces_round_trip() {
    let (store, _dir) = open_store().await;
    for ns in ["order", "group", "select", "table"] {
        store.upsert(ns, "k1", br#"{"v":1}"#, true).await.unwrap();
        assert_eq!(store.get(ns, "k1").await.unwrap(), br#"{"v":1}"#);
        assert_eq!(store.get_all(ns).await.unwrap().len(), 1);
        assert!(store.contains(ns, "k1").await.unwrap());
    }
    assert_eq!(
        store.list_namespaces().await.unwrap(),
        vec!["group", "order", "select", "table"]
    );

    store.delete_all("order").await.unwrap();
    assert!(store.get_all("order").await.unwrap().is_empty());
    store.drop_namespace("table").await.unwrap();
    assert!(!store.list_namespaces().await.unwrap().contains(&"table".to_string()));
}

#[tokio::test]
async fn namespace_names_are_case_insensitive() {
    let (store, _dir) = open_store().await;
    store.upsert("Users", "u1", br#"{"n":1}"#, false).await.unwrap();

    assert_eq!(store.get("users", "u1").await.unwrap(), br#"{"n":1}"#);
    let err = store
        .upsert("USERS", "u1", br#"{"n":2}"#, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ItemConflict);
    assert_eq!(store.list_namespaces().await.unwrap(), vec!["users"]);
}

// ── Typed helpers ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    tags: HashMap<String, u32>,
}

#[tokio::test]
async fn json_helpers_round_trip_typed_values() {
    let (store, _dir) = open_store().await;
    let profile = Profile {
        name: "Ann".to_string(),
        tags: HashMap::from([("admin".to_string(), 1)]),
    };

    store.upsert_json("profiles", "ann", &profile, false).await.unwrap();
    let loaded: Profile = store.get_json("profiles", "ann").await.unwrap();
    assert_eq!(loaded, profile);

    store.upsert("profiles", "broken", b"[1,2,3]", true).await.unwrap();
    let err = store.get_json::<Profile>("profiles", "broken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

// ── Concurrency ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_non_overwrite_upserts_have_one_winner() {
    let (store, _dir) = open_store().await;
    store.create_namespace("race").await.unwrap();

    let mut handles = Vec::new();
    for writer in 0..4u32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let value = format!(r#"{{"writer":{writer}}}"#);
            store.upsert("race", "contested", value.as_bytes(), false).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::ItemConflict, "{e}");
                conflicts += 1;
            }
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 3);
}

// ── Lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn data_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::sqlite(dir.path().join("kv.db"));

    let store = KvStore::connect(&config).await.unwrap();
    store.upsert("prod", "api", br#"{"v":1}"#, true).await.unwrap();
    store.shutdown().await.unwrap();

    let store = KvStore::connect(&config).await.unwrap();
    assert_eq!(store.get("prod", "api").await.unwrap(), br#"{"v":1}"#);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn connect_fails_for_unreachable_backend() {
    let mut config = StoreConfig::mysql("127.0.0.1:1", "kv", "kv", "secret");
    config.pool.min_connections = 0;
    config.pool.acquire_timeout_secs = 2;

    let err = KvStore::connect(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!err.to_string().contains("secret"));
}
