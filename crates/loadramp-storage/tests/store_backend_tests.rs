//! Integration tests for run store backends behind `dyn RunStore`

use bytes::Bytes;
use loadramp_core::{CoreError, RunResult, StepReport};
use loadramp_storage::object_store::MockObjectStore;
use loadramp_storage::{
    open_store, LocalRunStore, MemoryRunStore, MirroredRunStore, RunStore, StoreBackend,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn encoded_run(levels: &[i64]) -> Bytes {
    let result: RunResult = levels
        .iter()
        .map(|&c| StepReport::new(c, "http://localhost/", Default::default()))
        .collect::<Vec<_>>()
        .into();
    Bytes::from(result.encode().unwrap())
}

async fn exercise_store(store: Arc<dyn RunStore>) {
    assert!(store.keys().await.unwrap().is_empty());

    let data = encoded_run(&[1, 2, 3]);
    let written = store.set("ramp-a", data.clone()).await.unwrap();
    assert_eq!(written, data.len());

    // Overwrite keeps a single entry
    let replacement = encoded_run(&[5]);
    store.set("ramp-a", replacement.clone()).await.unwrap();
    store.set("ramp-b", data.clone()).await.unwrap();

    let keys: Vec<String> = store.keys().await.unwrap().into_iter().collect();
    assert_eq!(keys, vec!["ramp-a".to_string(), "ramp-b".to_string()]);

    let stored = store.get("ramp-a").await.unwrap();
    assert_eq!(stored, replacement);
    let decoded = RunResult::decode(&stored).unwrap();
    assert_eq!(decoded.concurrency_levels(), vec![5]);

    let missing = store.get("never-written").await;
    assert!(matches!(missing, Err(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_memory_backend_contract() {
    exercise_store(Arc::new(MemoryRunStore::new())).await;
}

#[tokio::test]
async fn test_filesystem_backend_contract() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalRunStore::new(temp_dir.path()).await.unwrap();
    exercise_store(Arc::new(store)).await;
}

#[tokio::test]
async fn test_mirrored_backend_contract() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockObjectStore::new());
    let store = MirroredRunStore::new(
        LocalRunStore::new(temp_dir.path()).await.unwrap(),
        mock.clone(),
    );
    exercise_store(Arc::new(store)).await;

    // Give the detached uploads a moment to finish
    for _ in 0..200 {
        if mock.successful_puts() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(mock.successful_puts(), 3);
    assert!(mock.contains_key("ramp-a.json"));
    assert!(mock.contains_key("ramp-b.json"));
}

#[tokio::test]
async fn test_filesystem_results_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let backend = StoreBackend::Filesystem {
        path: temp_dir.path().join("runs"),
    };

    let first = open_store(&backend).await.unwrap();
    first.set("persisted", encoded_run(&[1, 2])).await.unwrap();
    drop(first);

    let reopened = open_store(&backend).await.unwrap();
    let keys: Vec<String> = reopened.keys().await.unwrap().into_iter().collect();
    assert_eq!(keys, vec!["persisted".to_string()]);

    let decoded = RunResult::decode(&reopened.get("persisted").await.unwrap()).unwrap();
    assert_eq!(decoded.len(), 2);
}
