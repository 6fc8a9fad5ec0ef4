//! Storage backends for content and rights records.
//!
//! Every backend holds two logical tables keyed by [`ContentId`] plus the id
//! counter:
//!
//! - `MemoryStore`: in-process tables, lost on exit
//! - `JournalStore`: append-only JSONL journal replayed on open
//! - `SqliteStore`: SQLite database with transactional co-creation

pub mod journal;
pub mod memory;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::{Backend, ResolvedConfig};
use crate::domain::{ContentId, ContentRecord, RightsRecord};

pub use journal::JournalStore;
pub use memory::{MemoryStore, Tables};
pub use sqlite::SqliteStore;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record already exists: {0}")]
    Duplicate(ContentId),

    #[error("Record missing: {0}")]
    Missing(ContentId),

    #[error("Out-of-order id allocation: expected {expected}, got {actual}")]
    IdSequence { expected: u64, actual: u64 },

    #[error("Store is locked by another process: {}", .0.display())]
    Locked(PathBuf),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Corrupt journal at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("Partial write for {content_id}: {source}; rollback failed: {rollback}")]
    PartialWrite {
        content_id: ContentId,
        source: Box<StoreError>,
        rollback: Box<StoreError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A single change to the tables.
///
/// Backends that log their writes persist these verbatim; replaying them in
/// order rebuilds the tables and the id counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Id handed out (kept even if the creation is later rolled back)
    AllocateId { content_id: ContentId },

    /// Content and rights committed together
    CreatePair {
        content: ContentRecord,
        rights: RightsRecord,
    },

    InsertContent { content: ContentRecord },

    InsertRights { rights: RightsRecord },

    UpdateContent { content: ContentRecord },

    UpdateRights { rights: RightsRecord },

    /// Compensating removal of an incomplete creation (drops rights too)
    RemoveContent { content_id: ContentId },
}

/// Key-value storage for the two record tables and the id counter
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Atomically hand out the next id
    async fn allocate_id(&self) -> Result<ContentId, StoreError>;

    async fn get_content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError>;

    async fn get_rights(&self, id: ContentId) -> Result<Option<RightsRecord>, StoreError>;

    /// All content records in id order
    async fn list_content(&self) -> Result<Vec<ContentRecord>, StoreError>;

    async fn insert_content(&self, content: &ContentRecord) -> Result<(), StoreError>;

    async fn insert_rights(&self, rights: &RightsRecord) -> Result<(), StoreError>;

    /// Replace a content record in full
    async fn update_content(&self, content: &ContentRecord) -> Result<(), StoreError>;

    /// Replace a rights record in full
    async fn update_rights(&self, rights: &RightsRecord) -> Result<(), StoreError>;

    /// Remove a content record and any rights attached to it
    async fn remove_content(&self, id: ContentId) -> Result<(), StoreError>;

    /// Commit a content record and its rights as one unit.
    ///
    /// The default sequences the two inserts and removes the content record
    /// again if the rights insert fails. If that removal fails as well the
    /// result is [`StoreError::PartialWrite`]. Backends that can write both
    /// records atomically override this.
    async fn insert_pair(
        &self,
        content: &ContentRecord,
        rights: &RightsRecord,
    ) -> Result<(), StoreError> {
        self.insert_content(content).await?;

        if let Err(err) = self.insert_rights(rights).await {
            warn!(
                content_id = %content.content_id,
                error = %err,
                "Rights insert failed, rolling back content"
            );
            return match self.remove_content(content.content_id).await {
                Ok(()) => Err(err),
                Err(rollback) => Err(StoreError::PartialWrite {
                    content_id: content.content_id,
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                }),
            };
        }

        Ok(())
    }
}

/// Open the backend selected by the configuration
pub async fn open_store(config: &ResolvedConfig) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Journal => Arc::new(
            JournalStore::open(&config.home)
                .await
                .with_context(|| format!("Failed to open journal in {}", config.home.display()))?,
        ),
        Backend::Sqlite => {
            let path = config.home.join("registry.db");
            Arc::new(
                SqliteStore::open(&path)
                    .with_context(|| format!("Failed to open database: {}", path.display()))?,
            )
        }
    };

    Ok(store)
}
