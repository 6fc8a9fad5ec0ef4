//! Content registry: creation and publication state of content records.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{RecordLocks, RegistryError, Vocabulary};
use crate::domain::{ContentId, ContentRecord, ContentType, NewContent, Principal, MAX_DURATION};
use crate::store::RecordStore;

/// Filter for listing content
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub content_type: Option<ContentType>,
    pub published: Option<bool>,
    pub creator: Option<Principal>,
    pub limit: Option<usize>,
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<ContentType>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn with_creator(mut self, creator: Principal) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &ContentRecord) -> bool {
        self.content_type
            .as_ref()
            .map_or(true, |t| &record.content_type == t)
            && self.published.map_or(true, |p| record.is_published == p)
            && self.creator.as_ref().map_or(true, |c| &record.creator == c)
    }
}

/// Owns content records and the publish transition
#[derive(Clone)]
pub struct ContentRegistry {
    store: Arc<dyn RecordStore>,
    locks: Arc<RecordLocks>,
    vocabulary: Arc<Vocabulary>,
}

impl ContentRegistry {
    pub fn new(
        store: Arc<dyn RecordStore>,
        locks: Arc<RecordLocks>,
        vocabulary: Arc<Vocabulary>,
    ) -> Self {
        Self {
            store,
            locks,
            vocabulary,
        }
    }

    /// Validate the input and allocate an id for it.
    ///
    /// The record is not stored yet; the id is consumed either way.
    pub(crate) async fn draft(
        &self,
        creator: &Principal,
        input: NewContent,
    ) -> Result<ContentRecord, RegistryError> {
        self.vocabulary.check_content_type(&input.content_type)?;
        if input.duration > MAX_DURATION {
            return Err(RegistryError::Validation(format!(
                "Duration {} exceeds maximum {}",
                input.duration, MAX_DURATION
            )));
        }

        let content_id = self.store.allocate_id().await?;
        debug!(%content_id, "Allocated content id");

        Ok(ContentRecord::new(content_id, creator.clone(), input))
    }

    /// Mark content as published. Only the original creator may do this.
    ///
    /// Publishing twice succeeds and leaves the record unchanged.
    #[instrument(skip(self, caller), fields(caller = %caller))]
    pub async fn publish(&self, caller: &Principal, id: ContentId) -> Result<(), RegistryError> {
        let _guard = self.locks.acquire(id).await;

        let mut record = self
            .store
            .get_content(id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;

        if &record.creator != caller {
            return Err(RegistryError::Forbidden {
                content_id: id,
                principal: caller.clone(),
            });
        }

        if record.is_published {
            debug!("Content already published");
            return Ok(());
        }

        record.is_published = true;
        self.store.update_content(&record).await?;
        info!(content_id = %id, "Content published");

        Ok(())
    }

    /// Fetch a content record
    pub async fn get(&self, id: ContentId) -> Result<ContentRecord, RegistryError> {
        let _guard = self.locks.acquire(id).await;
        self.store
            .get_content(id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    /// List content in id order
    pub async fn list(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>, RegistryError> {
        let mut records: Vec<_> = self
            .store
            .list_content()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by_key(|r| r.content_id);

        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }

        Ok(records)
    }
}
