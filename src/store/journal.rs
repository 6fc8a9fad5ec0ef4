//! Append-only journal store with file-based persistence.
//!
//! Every mutation is written as one line of newline-delimited JSON (JSONL)
//! before it is applied to the in-memory tables. Opening the store replays
//! the journal to rebuild the tables and the id counter. A final line cut
//! short by a crash is dropped on open; damage anywhere else is an error.
//!
//! # Layout
//!
//! ```text
//! <home>/
//! ├── journal.jsonl   # One JournalEntry per line
//! └── journal.lock    # Held exclusively while the store is open
//! ```

use std::fs::File as StdFile;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Mutation, RecordStore, StoreError, Tables};
use crate::domain::{ContentId, ContentRecord, RightsRecord};

/// One line of the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier for this entry
    pub id: Uuid,

    /// When the mutation was committed
    pub timestamp: DateTime<Utc>,

    /// The change itself
    pub mutation: Mutation,

    /// SHA-256 over the serialized mutation (hex)
    pub checksum: String,
}

impl JournalEntry {
    pub fn new(mutation: Mutation) -> Result<Self, StoreError> {
        let checksum = checksum(&mutation)?;
        Ok(Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mutation,
            checksum,
        })
    }

    /// Whether the stored checksum still matches the mutation
    pub fn verify(&self) -> Result<bool, StoreError> {
        Ok(checksum(&self.mutation)? == self.checksum)
    }
}

fn checksum(mutation: &Mutation) -> Result<String, StoreError> {
    let json = serde_json::to_string(mutation)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// File-backed store using a JSONL journal
pub struct JournalStore {
    /// Path to the journal.jsonl file
    journal_path: PathBuf,

    /// Current tables; the mutex also serializes journal appends
    tables: Mutex<Tables>,

    /// Advisory lock held for the lifetime of the store
    _lock: StdFile,
}

impl JournalStore {
    /// Open (or create) the journal in `dir` and replay it
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).await?;

        let lock_path = dir.join("journal.lock");
        let lock = StdFile::create(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path.clone()))?;

        let journal_path = dir.join("journal.jsonl");
        let tables = Self::replay(&journal_path).await?;

        info!(
            path = %journal_path.display(),
            records = tables.len(),
            next_id = %tables.next_id(),
            "Journal store opened"
        );

        Ok(Self {
            journal_path,
            tables: Mutex::new(tables),
            _lock: lock,
        })
    }

    /// Get the path to the journal file
    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Rebuild tables by replaying every entry in order.
    ///
    /// An unterminated last line that does not parse is a torn write: it is
    /// truncated away. One that parses is kept and terminated.
    pub async fn replay(path: &Path) -> Result<Tables, StoreError> {
        let mut tables = Tables::new();

        if !path.exists() {
            return Ok(tables);
        }

        let data = fs::read(path).await?;
        let mut offset = 0u64;
        let mut line_no = 0;

        for chunk in data.split_inclusive(|b| *b == b'\n') {
            line_no += 1;
            let start = offset;
            offset += chunk.len() as u64;
            let terminated = chunk.ends_with(b"\n");

            if chunk.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let entry: JournalEntry = match serde_json::from_slice(chunk) {
                Ok(entry) => entry,
                Err(e) if !terminated => {
                    warn!(
                        line = line_no,
                        bytes = chunk.len(),
                        error = %e,
                        "Dropping torn journal tail"
                    );
                    truncate(path, start).await?;
                    break;
                }
                Err(e) => {
                    return Err(StoreError::Corrupt {
                        line: line_no,
                        reason: e.to_string(),
                    })
                }
            };

            if !entry.verify()? {
                return Err(StoreError::Corrupt {
                    line: line_no,
                    reason: "checksum mismatch".to_string(),
                });
            }

            tables
                .commit(entry.mutation)
                .map_err(|e| StoreError::Corrupt {
                    line: line_no,
                    reason: e.to_string(),
                })?;

            if !terminated {
                debug!(line = line_no, "Terminating last journal line");
                let mut file = OpenOptions::new().append(true).open(path).await?;
                write_synced(&mut file, b"\n").await?;
            }
        }

        debug!(entries = line_no, "Journal replayed");
        Ok(tables)
    }

    /// Append an entry to the journal and sync it to disk.
    ///
    /// On failure the file is cut back to its previous length.
    async fn append(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        let line = format!("{}\n", serde_json::to_string(entry)?);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .await?;
        let len = file.metadata().await?.len();

        if let Err(e) = write_synced(&mut file, line.as_bytes()).await {
            warn!(error = %e, "Journal append failed, truncating partial entry");
            file.set_len(len).await?;
            return Err(e);
        }

        Ok(())
    }

    /// Write-ahead commit: validate, append, then apply
    async fn commit(&self, mutation: Mutation) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        self.commit_locked(&mut tables, mutation).await
    }

    async fn commit_locked(&self, tables: &mut Tables, mutation: Mutation) -> Result<(), StoreError> {
        tables.check(&mutation)?;
        let entry = JournalEntry::new(mutation)?;
        self.append(&entry).await?;
        tables.apply(entry.mutation);
        Ok(())
    }
}

async fn write_synced(file: &mut File, bytes: &[u8]) -> Result<(), StoreError> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

async fn truncate(path: &Path, len: u64) -> Result<(), StoreError> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_data().await?;
    Ok(())
}

#[async_trait]
impl RecordStore for JournalStore {
    fn backend(&self) -> &'static str {
        "journal"
    }

    async fn allocate_id(&self) -> Result<ContentId, StoreError> {
        let mut tables = self.tables.lock().await;
        let content_id = tables.next_id();
        self.commit_locked(&mut tables, Mutation::AllocateId { content_id })
            .await?;
        Ok(content_id)
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError> {
        Ok(self.tables.lock().await.content(id).cloned())
    }

    async fn get_rights(&self, id: ContentId) -> Result<Option<RightsRecord>, StoreError> {
        Ok(self.tables.lock().await.rights(id).cloned())
    }

    async fn list_content(&self) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.tables.lock().await.all_content().cloned().collect())
    }

    async fn insert_content(&self, content: &ContentRecord) -> Result<(), StoreError> {
        self.commit(Mutation::InsertContent {
            content: content.clone(),
        })
        .await
    }

    async fn insert_rights(&self, rights: &RightsRecord) -> Result<(), StoreError> {
        self.commit(Mutation::InsertRights {
            rights: rights.clone(),
        })
        .await
    }

    async fn update_content(&self, content: &ContentRecord) -> Result<(), StoreError> {
        self.commit(Mutation::UpdateContent {
            content: content.clone(),
        })
        .await
    }

    async fn update_rights(&self, rights: &RightsRecord) -> Result<(), StoreError> {
        self.commit(Mutation::UpdateRights {
            rights: rights.clone(),
        })
        .await
    }

    async fn remove_content(&self, id: ContentId) -> Result<(), StoreError> {
        self.commit(Mutation::RemoveContent { content_id: id }).await
    }

    // One journal line carries both records, so a crash can never leave
    // content without rights.
    async fn insert_pair(
        &self,
        content: &ContentRecord,
        rights: &RightsRecord,
    ) -> Result<(), StoreError> {
        self.commit(Mutation::CreatePair {
            content: content.clone(),
            rights: rights.clone(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewContent, Principal};
    use tempfile::TempDir;

    fn sample(id: ContentId) -> (ContentRecord, RightsRecord) {
        let creator = Principal::new("alice").unwrap();
        let content = ContentRecord::new(
            id,
            creator.clone(),
            NewContent::new("Clip", "A clip", "hash-clip", "video", 42),
        );
        (content, RightsRecord::initial(id, creator))
    }

    #[tokio::test]
    async fn test_reopen_replays_records() {
        let temp = TempDir::new().unwrap();

        let id = {
            let store = JournalStore::open(temp.path()).await.unwrap();
            let id = store.allocate_id().await.unwrap();
            let (content, rights) = sample(id);
            store.insert_pair(&content, &rights).await.unwrap();

            let mut published = content.clone();
            published.is_published = true;
            store.update_content(&published).await.unwrap();
            id
        };

        let store = JournalStore::open(temp.path()).await.unwrap();
        let content = store.get_content(id).await.unwrap().unwrap();
        assert!(content.is_published);
        assert!(store.get_rights(id).await.unwrap().is_some());
        assert_eq!(store.allocate_id().await.unwrap().get(), 2);
    }

    #[tokio::test]
    async fn test_second_open_is_locked() {
        let temp = TempDir::new().unwrap();
        let _first = JournalStore::open(temp.path()).await.unwrap();

        let second = JournalStore::open(temp.path()).await;
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_not_journaled() {
        let temp = TempDir::new().unwrap();
        let store = JournalStore::open(temp.path()).await.unwrap();
        let (content, _) = sample(ContentId::FIRST);

        // Id 1 was never allocated
        assert!(store.insert_content(&content).await.is_err());

        let journal = std::fs::read_to_string(store.journal_path()).unwrap_or_default();
        assert!(journal.trim().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_entry_is_corrupt() {
        let temp = TempDir::new().unwrap();
        {
            let store = JournalStore::open(temp.path()).await.unwrap();
            let id = store.allocate_id().await.unwrap();
            let (content, rights) = sample(id);
            store.insert_pair(&content, &rights).await.unwrap();
        }

        let path = temp.path().join("journal.jsonl");
        let journal = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, journal.replace("alice", "mallory")).unwrap();

        let result = JournalStore::replay(&path).await;
        assert!(matches!(result, Err(StoreError::Corrupt { line: 2, .. })));
    }

    #[tokio::test]
    async fn test_burned_id_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = JournalStore::open(temp.path()).await.unwrap();
            let burned = store.allocate_id().await.unwrap();
            let (content, _) = sample(burned);
            let (_, stray_rights) = sample(ContentId::new(7).unwrap());
            // Rights for an unknown id make the pair fail after allocation
            assert!(store.insert_pair(&content, &stray_rights).await.is_err());
        }

        let store = JournalStore::open(temp.path()).await.unwrap();
        assert!(store.get_content(ContentId::FIRST).await.unwrap().is_none());
        assert_eq!(store.allocate_id().await.unwrap().get(), 2);
    }

    #[tokio::test]
    async fn test_torn_tail_is_dropped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.jsonl");
        let id = {
            let store = JournalStore::open(temp.path()).await.unwrap();
            let id = store.allocate_id().await.unwrap();
            let (content, rights) = sample(id);
            store.insert_pair(&content, &rights).await.unwrap();
            id
        };
        let intact = std::fs::read_to_string(&path).unwrap();

        // Crash halfway through the next append
        let mut torn = intact.clone();
        torn.push_str(r#"{"id":"5b1c"#);
        std::fs::write(&path, torn).unwrap();

        {
            let store = JournalStore::open(temp.path()).await.unwrap();
            assert!(store.get_rights(id).await.unwrap().is_some());
            assert_eq!(std::fs::read_to_string(&path).unwrap(), intact);

            let next = store.allocate_id().await.unwrap();
            let (content, rights) = sample(next);
            store.insert_pair(&content, &rights).await.unwrap();
        }

        let store = JournalStore::open(temp.path()).await.unwrap();
        assert!(store.get_content(ContentId::new(2).unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unterminated_complete_entry_is_kept() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.jsonl");
        {
            let store = JournalStore::open(temp.path()).await.unwrap();
            store.allocate_id().await.unwrap();
        }
        let journal = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, journal.trim_end()).unwrap();

        {
            let store = JournalStore::open(temp.path()).await.unwrap();
            assert_eq!(store.allocate_id().await.unwrap().get(), 2);
        }

        let store = JournalStore::open(temp.path()).await.unwrap();
        assert_eq!(store.allocate_id().await.unwrap().get(), 3);
    }

    #[tokio::test]
    async fn test_torn_middle_line_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.jsonl");
        {
            let store = JournalStore::open(temp.path()).await.unwrap();
            store.allocate_id().await.unwrap();
        }
        let journal = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, format!("{{\"id\":\"5b1c\n{}", journal)).unwrap();

        let result = JournalStore::open(temp.path()).await;
        assert!(matches!(result, Err(StoreError::Corrupt { line: 1, .. })));
    }

    #[test]
    fn test_entry_checksum() {
        let entry = JournalEntry::new(Mutation::AllocateId {
            content_id: ContentId::FIRST,
        })
        .unwrap();

        assert_eq!(entry.checksum.len(), 64);
        assert!(entry.verify().unwrap());
    }
}
