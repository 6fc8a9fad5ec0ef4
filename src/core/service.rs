//! Caller-facing registry service.
//!
//! Ties the content registry and the rights ledger to one store and runs the
//! creation flow, which commits a content record and its rights together.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, instrument};

use super::{ContentFilter, ContentRegistry, RecordLocks, RegistryError, RightsLedger, Vocabulary};
use crate::config::ResolvedConfig;
use crate::domain::{ContentId, ContentRecord, NewContent, Principal, RightsRecord, RightsTransfer};
use crate::store::{self, MemoryStore, RecordStore, StoreError};

/// Registry of content records and their rights
#[derive(Clone)]
pub struct RegistryService {
    store: Arc<dyn RecordStore>,
    locks: Arc<RecordLocks>,
    registry: ContentRegistry,
    ledger: RightsLedger,
}

impl RegistryService {
    /// Create a service over an existing store
    pub fn new(store: Arc<dyn RecordStore>, vocabulary: Vocabulary) -> Self {
        let locks = Arc::new(RecordLocks::new());
        let vocabulary = Arc::new(vocabulary);

        Self {
            registry: ContentRegistry::new(store.clone(), locks.clone(), vocabulary.clone()),
            ledger: RightsLedger::new(store.clone(), locks.clone(), vocabulary),
            store,
            locks,
        }
    }

    /// Volatile service with only the built-in vocabulary
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Vocabulary::new())
    }

    /// Open the store and vocabulary described by the configuration
    pub async fn open(config: &ResolvedConfig) -> Result<Self> {
        let store = store::open_store(config).await?;
        info!(backend = store.backend(), home = %config.home.display(), "Registry opened");
        Ok(Self::new(store, config.vocabulary.clone()))
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &RightsLedger {
        &self.ledger
    }

    /// Register new content on behalf of `caller`.
    ///
    /// The caller becomes creator and initial rights owner. The allocated id
    /// is never handed out again, even if the commit below fails.
    #[instrument(skip(self, caller, input), fields(caller = %caller, title = %input.title))]
    pub async fn create_content(
        &self,
        caller: &Principal,
        input: NewContent,
    ) -> Result<ContentId, RegistryError> {
        let content = self.registry.draft(caller, input).await?;
        let content_id = content.content_id;

        let _guard = self.locks.acquire(content_id).await;
        let rights = self.ledger.initialize_rights(content_id, caller.clone());

        self.store
            .insert_pair(&content, &rights)
            .await
            .map_err(|err| match err {
                StoreError::PartialWrite { .. } => RegistryError::PartialCreate {
                    content_id,
                    source: err,
                },
                err => RegistryError::Storage(err),
            })?;

        info!(%content_id, content_type = %content.content_type, "Content created");
        Ok(content_id)
    }

    /// Publish content (creator only, idempotent)
    pub async fn publish_content(&self, caller: &Principal, id: ContentId) -> Result<(), RegistryError> {
        self.registry.publish(caller, id).await
    }

    /// Overwrite the rights of a content item (current owner only)
    pub async fn transfer_rights(
        &self,
        caller: &Principal,
        id: ContentId,
        transfer: RightsTransfer,
    ) -> Result<(), RegistryError> {
        self.ledger.transfer(caller, id, transfer).await.map(|_| ())
    }

    pub async fn get_content(&self, id: ContentId) -> Result<ContentRecord, RegistryError> {
        self.registry.get(id).await
    }

    pub async fn get_content_rights(&self, id: ContentId) -> Result<RightsRecord, RegistryError> {
        self.ledger.get(id).await
    }

    pub async fn list_content(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>, RegistryError> {
        self.registry.list(filter).await
    }
}
