//! Rights ledger: current owner and license terms per content item.

use std::sync::Arc;

use tracing::{info, instrument};

use super::{RecordLocks, RegistryError, Vocabulary};
use crate::domain::{ContentId, Principal, RightsRecord, RightsTransfer, RoyaltyPercentage};
use crate::store::RecordStore;

/// Owns rights records and the transfer operation
#[derive(Clone)]
pub struct RightsLedger {
    store: Arc<dyn RecordStore>,
    locks: Arc<RecordLocks>,
    vocabulary: Arc<Vocabulary>,
}

impl RightsLedger {
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

    /// Rights for freshly created content.
    ///
    /// Only the creation flow calls this; the record is committed together
    /// with its content.
    pub(crate) fn initialize_rights(&self, content_id: ContentId, owner: Principal) -> RightsRecord {
        RightsRecord::initial(content_id, owner)
    }

    /// Replace all rights terms. Only the current owner may do this.
    ///
    /// Existence and ownership are checked before the new terms are
    /// validated.
    #[instrument(skip(self, caller, transfer), fields(caller = %caller, new_owner = %transfer.new_owner))]
    pub async fn transfer(
        &self,
        caller: &Principal,
        id: ContentId,
        transfer: RightsTransfer,
    ) -> Result<RightsRecord, RegistryError> {
        let _guard = self.locks.acquire(id).await;

        let current = self
            .store
            .get_rights(id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;

        if &current.owner != caller {
            return Err(RegistryError::Forbidden {
                content_id: id,
                principal: caller.clone(),
            });
        }

        let royalty_percentage =
            RoyaltyPercentage::new(transfer.royalty_percentage).map_err(RegistryError::Validation)?;
        self.vocabulary.check_license_type(&transfer.license_type)?;

        let updated = RightsRecord {
            content_id: id,
            owner: transfer.new_owner,
            license_type: transfer.license_type,
            royalty_percentage,
            expiration_date: transfer.expiration_date,
        };
        self.store.update_rights(&updated).await?;

        info!(
            content_id = %id,
            license = %updated.license_type,
            royalty = %updated.royalty_percentage,
            "Rights transferred"
        );

        Ok(updated)
    }

    /// Fetch a rights record
    pub async fn get(&self, id: ContentId) -> Result<RightsRecord, RegistryError> {
        let _guard = self.locks.acquire(id).await;
        self.store
            .get_rights(id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }
}
