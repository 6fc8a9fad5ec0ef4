//! In-process tables.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Mutation, RecordStore, StoreError};
use crate::domain::{ContentId, ContentRecord, RightsRecord};

/// The two record tables and the id counter.
///
/// Shared by the memory and journal backends. Every change goes through
/// [`Tables::check`] before [`Tables::apply`], so a rejected mutation never
/// leaves the tables half-updated.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    content: BTreeMap<ContentId, ContentRecord>,
    rights: BTreeMap<ContentId, RightsRecord>,
    last_id: u64,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next allocation will produce
    pub fn next_id(&self) -> ContentId {
        ContentId::new(self.last_id + 1).unwrap_or(ContentId::FIRST)
    }

    pub fn content(&self, id: ContentId) -> Option<&ContentRecord> {
        self.content.get(&id)
    }

    pub fn rights(&self, id: ContentId) -> Option<&RightsRecord> {
        self.rights.get(&id)
    }

    pub fn all_content(&self) -> impl Iterator<Item = &ContentRecord> {
        self.content.values()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Verify a mutation can be applied without changing anything
    pub fn check(&self, mutation: &Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::AllocateId { content_id } => {
                let expected = self.last_id + 1;
                if content_id.get() != expected {
                    return Err(StoreError::IdSequence {
                        expected,
                        actual: content_id.get(),
                    });
                }
            }
            Mutation::CreatePair { content, rights } => {
                if content.content_id != rights.content_id {
                    return Err(StoreError::Missing(rights.content_id));
                }
                self.ensure_allocated(content.content_id)?;
                self.ensure_absent(content.content_id)?;
            }
            Mutation::InsertContent { content } => {
                self.ensure_allocated(content.content_id)?;
                self.ensure_absent(content.content_id)?;
            }
            Mutation::InsertRights { rights } => {
                if !self.content.contains_key(&rights.content_id) {
                    return Err(StoreError::Missing(rights.content_id));
                }
                if self.rights.contains_key(&rights.content_id) {
                    return Err(StoreError::Duplicate(rights.content_id));
                }
            }
            Mutation::UpdateContent { content } => {
                if !self.content.contains_key(&content.content_id) {
                    return Err(StoreError::Missing(content.content_id));
                }
            }
            Mutation::UpdateRights { rights } => {
                if !self.rights.contains_key(&rights.content_id) {
                    return Err(StoreError::Missing(rights.content_id));
                }
            }
            Mutation::RemoveContent { content_id } => {
                if !self.content.contains_key(content_id) {
                    return Err(StoreError::Missing(*content_id));
                }
            }
        }
        Ok(())
    }

    /// Apply a mutation that already passed [`Tables::check`]
    pub fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::AllocateId { content_id } => {
                self.last_id = self.last_id.max(content_id.get());
            }
            Mutation::CreatePair { content, rights } => {
                self.content.insert(content.content_id, content);
                self.rights.insert(rights.content_id, rights);
            }
            Mutation::InsertContent { content } | Mutation::UpdateContent { content } => {
                self.content.insert(content.content_id, content);
            }
            Mutation::InsertRights { rights } | Mutation::UpdateRights { rights } => {
                self.rights.insert(rights.content_id, rights);
            }
            Mutation::RemoveContent { content_id } => {
                self.content.remove(&content_id);
                self.rights.remove(&content_id);
            }
        }
    }

    /// Check then apply
    pub fn commit(&mut self, mutation: Mutation) -> Result<(), StoreError> {
        self.check(&mutation)?;
        self.apply(mutation);
        Ok(())
    }

    // Records may only be written under ids the counter has already handed out.
    fn ensure_allocated(&self, id: ContentId) -> Result<(), StoreError> {
        if id.get() > self.last_id {
            return Err(StoreError::IdSequence {
                expected: self.last_id,
                actual: id.get(),
            });
        }
        Ok(())
    }

    fn ensure_absent(&self, id: ContentId) -> Result<(), StoreError> {
        if self.content.contains_key(&id) || self.rights.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        Ok(())
    }
}

/// Volatile store backed by [`Tables`] behind a lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }

    fn commit(&self, mutation: Mutation) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        tables.commit(mutation)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn allocate_id(&self) -> Result<ContentId, StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let content_id = tables.next_id();
        tables.commit(Mutation::AllocateId { content_id })?;
        Ok(content_id)
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError> {
        self.read(|t| t.content(id).cloned())
    }

    async fn get_rights(&self, id: ContentId) -> Result<Option<RightsRecord>, StoreError> {
        self.read(|t| t.rights(id).cloned())
    }

    async fn list_content(&self) -> Result<Vec<ContentRecord>, StoreError> {
        self.read(|t| t.all_content().cloned().collect())
    }

    async fn insert_content(&self, content: &ContentRecord) -> Result<(), StoreError> {
        self.commit(Mutation::InsertContent {
            content: content.clone(),
        })
    }

    async fn insert_rights(&self, rights: &RightsRecord) -> Result<(), StoreError> {
        self.commit(Mutation::InsertRights {
            rights: rights.clone(),
        })
    }

    async fn update_content(&self, content: &ContentRecord) -> Result<(), StoreError> {
        self.commit(Mutation::UpdateContent {
            content: content.clone(),
        })
    }

    async fn update_rights(&self, rights: &RightsRecord) -> Result<(), StoreError> {
        self.commit(Mutation::UpdateRights {
            rights: rights.clone(),
        })
    }

    async fn remove_content(&self, id: ContentId) -> Result<(), StoreError> {
        self.commit(Mutation::RemoveContent { content_id: id })
    }

    async fn insert_pair(
        &self,
        content: &ContentRecord,
        rights: &RightsRecord,
    ) -> Result<(), StoreError> {
        self.commit(Mutation::CreatePair {
            content: content.clone(),
            rights: rights.clone(),
        })
    }
}
