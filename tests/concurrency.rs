//! Concurrency Integration Tests
//!
//! Tests for id allocation and per-record serialization under parallel callers.

use std::collections::HashSet;
use std::sync::Arc;

use holoreg::{
    ContentId, JournalStore, NewContent, Principal, RegistryError, RegistryService,
    RightsTransfer, SqliteStore, Vocabulary,
};
use tempfile::TempDir;

async fn create_many(service: RegistryService, n: u64) -> Vec<ContentId> {
    let mut handles = Vec::new();
    for i in 0..n {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let creator = Principal::new(format!("creator-{}", i % 4)).unwrap();
            let input = NewContent::new(format!("Item {}", i), "", format!("hash-{}", i), "text", i);
            service.create_content(&creator, input).await.unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids
}

fn assert_dense(ids: &[ContentId], n: u64) {
    let unique: HashSet<u64> = ids.iter().map(|id| id.get()).collect();
    assert_eq!(unique.len() as u64, n);
    assert_eq!(unique, (1..=n).collect::<HashSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_creation_memory() {
    let service = RegistryService::in_memory();
    let ids = create_many(service.clone(), 64).await;
    assert_dense(&ids, 64);

    for id in ids {
        let rights = service.get_content_rights(id).await.unwrap();
        let content = service.get_content(id).await.unwrap();
        assert_eq!(rights.owner, content.creator);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_creation_journal() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(JournalStore::open(temp.path()).await.unwrap());
    let service = RegistryService::new(store, Vocabulary::new());

    let ids = create_many(service, 32).await;
    assert_dense(&ids, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_creation_sqlite() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let service = RegistryService::new(store, Vocabulary::new());

    let ids = create_many(service, 32).await;
    assert_dense(&ids, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_transfers_single_winner() {
    let service = RegistryService::in_memory();
    let owner = Principal::new("alice").unwrap();
    let id = service
        .create_content(&owner, NewContent::new("Race", "", "hash", "video", 1))
        .await
        .unwrap();

    // Every task tries to move the rights away from alice. Only the first
    // can succeed; the rest see a new owner and are refused.
    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            let to = Principal::new(format!("buyer-{}", i)).unwrap();
            let transfer = RightsTransfer::new(to, "exclusive", 0, None);
            service.transfer_rights(&owner, id, transfer).await
        }));
    }

    let mut succeeded = 0;
    let mut forbidden = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(RegistryError::Forbidden { .. }) => forbidden += 1,
            Err(other) => panic!("Unexpected error: {}", other),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(forbidden, 15);
    assert!(service
        .get_content_rights(id)
        .await
        .unwrap()
        .owner
        .as_str()
        .starts_with("buyer-"));
}
