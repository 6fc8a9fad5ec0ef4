//! Per-record mutation locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ContentId;

/// One async mutex per content id.
///
/// Holding the guard serializes every check-then-write on that record; other
/// records are unaffected.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: StdMutex<HashMap<ContentId, Arc<Mutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: ContentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_record_is_exclusive() {
        let locks = Arc::new(RecordLocks::new());
        let guard = locks.acquire(ContentId::FIRST).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(ContentId::FIRST).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_records_do_not_block() {
        let locks = RecordLocks::new();
        let _one = locks.acquire(ContentId::FIRST).await;
        let _two = locks.acquire(ContentId::FIRST.next()).await;
    }
}
