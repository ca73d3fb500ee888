use tablekv_store::KvStore;

use super::coded;

pub async fn list(store: &KvStore) -> anyhow::Result<()> {
    for name in store.list_namespaces().await.map_err(coded)? {
        println!("{name}");
    }
    Ok(())
}

pub async fn create(store: &KvStore, namespace: &str) -> anyhow::Result<()> {
    store.create_namespace(namespace).await.map_err(coded)?;
    println!("✓ Namespace {namespace} ready");
    Ok(())
}

pub async fn drop_namespace(store: &KvStore, namespace: &str) -> anyhow::Result<()> {
    store.drop_namespace(namespace).await.map_err(coded)?;
    println!("✓ Namespace {namespace} dropped");
    Ok(())
}
