//! # Admin Gateway
//!
//! Operator surface over camps, pricing items and registrations. Callers
//! are expected to have checked the bearer token already; this layer only
//! verifies credentials for token issuance.
//!
//! Archiving is always a status flip. Registration deletion anonymizes and
//! keeps the capacity effect; only `cancel_registration` (or a status edit
//! to a non-holding status) gives spots back.

use crate::camp::{Camp, CampDraft, CampPatch};
use crate::error::{CampError, CampResult, ValidationError};
use crate::ledger::CapacityLedger;
use crate::payment::{IntentRecord, IntentState};
use crate::pricing::{PricingItem, PricingItemDraft, PricingItemPatch};
use crate::registration::{Registration, RegistrationFilter, RegistrationPatch, RegistrationStatus};
use crate::settings::{AdminConfigUpdate, AdminConfigView, AdminSettings, BootstrapCredentials};
use crate::store::SharedStore;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AdminGateway {
    store: SharedStore,
    ledger: CapacityLedger,
    bootstrap: Option<BootstrapCredentials>,
    hash_cost: u32,
}

impl AdminGateway {
    pub fn new(store: SharedStore) -> Self {
        Self {
            ledger: CapacityLedger::new(store.clone()),
            store,
            bootstrap: None,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bootstrap(mut self, credentials: BootstrapCredentials) -> Self {
        self.bootstrap = Some(credentials);
        self
    }

    /// bcrypt work factor for new password hashes
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    // ----- auth & settings -------------------------------------------------

    /// Check credentials; returns the admin username on success
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> CampResult<String> {
        let settings = AdminSettings::load(self.store.as_ref()).await?;
        if settings.verify_credentials(username, password, self.bootstrap.as_ref()) {
            info!("Admin authenticated");
            Ok(username.to_string())
        } else {
            warn!("Admin authentication failed");
            Err(CampError::Auth("Invalid username or password".to_string()))
        }
    }

    pub async fn admin_config(&self) -> CampResult<AdminConfigView> {
        Ok(AdminSettings::load(self.store.as_ref()).await?.view())
    }

    pub async fn update_admin_config(&self, update: &AdminConfigUpdate) -> CampResult<AdminConfigView> {
        update.apply(self.store.as_ref(), self.hash_cost).await?;
        info!(
            default_max_spots = ?update.default_max_spots,
            credentials_changed = update.password.is_some(),
            "Admin config updated"
        );
        self.admin_config().await
    }

    // ----- camps -----------------------------------------------------------

    pub async fn list_camps(&self) -> CampResult<Vec<Camp>> {
        self.store.list_camps(true).await
    }

    pub async fn get_camp(&self, id: Uuid) -> CampResult<Camp> {
        self.store
            .get_camp(id)
            .await?
            .ok_or_else(|| CampError::not_found("Camp", id))
    }

    pub async fn create_camp(&self, draft: CampDraft) -> CampResult<Camp> {
        let settings = AdminSettings::load(self.store.as_ref()).await?;
        let camp = draft.into_camp(settings.default_max_spots)?;
        self.store.insert_camp(&camp).await?;
        info!(camp_id = %camp.id, max_spots = camp.max_spots, "Camp created");
        Ok(camp)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_camp(&self, id: Uuid, patch: CampPatch) -> CampResult<Camp> {
        let mut camp = self.get_camp(id).await?;
        camp.apply_patch(patch)?;
        if !self.store.update_camp(&camp).await? {
            // A reservation landed between our read and the write.
            let current = self.get_camp(id).await?;
            return Err(ValidationError::field(
                "maxSpots",
                format!(
                    "maxSpots cannot be lower than the {} spots already taken",
                    current.spots_taken
                ),
            )
            .into());
        }
        info!("Camp updated");
        self.get_camp(id).await
    }

    /// Soft delete
    pub async fn archive_camp(&self, id: Uuid) -> CampResult<Camp> {
        let camp = self
            .store
            .set_camp_archived(id, true)
            .await?
            .ok_or_else(|| CampError::not_found("Camp", id))?;
        info!(camp_id = %id, "Camp archived");
        Ok(camp)
    }

    pub async fn restore_camp(&self, id: Uuid) -> CampResult<Camp> {
        let camp = self
            .store
            .set_camp_archived(id, false)
            .await?
            .ok_or_else(|| CampError::not_found("Camp", id))?;
        info!(camp_id = %id, status = camp.status.as_str(), "Camp restored");
        Ok(camp)
    }

    // ----- pricing ---------------------------------------------------------

    pub async fn list_pricing(&self) -> CampResult<Vec<PricingItem>> {
        self.store.list_pricing_items(true).await
    }

    pub async fn get_pricing_item(&self, id: Uuid) -> CampResult<PricingItem> {
        self.store
            .get_pricing_item(id)
            .await?
            .ok_or_else(|| CampError::not_found("Pricing item", id))
    }

    pub async fn create_pricing_item(&self, draft: PricingItemDraft) -> CampResult<PricingItem> {
        let item = draft.into_item()?;
        if let Some(camp_id) = item.camp_id {
            self.get_camp(camp_id).await?;
        }
        self.store.insert_pricing_item(&item).await?;
        info!(item_id = %item.id, amount = item.amount, "Pricing item created");
        Ok(item)
    }

    pub async fn update_pricing_item(
        &self,
        id: Uuid,
        patch: PricingItemPatch,
    ) -> CampResult<PricingItem> {
        let mut item = self.get_pricing_item(id).await?;
        item.apply_patch(patch)?;
        if let Some(camp_id) = item.camp_id {
            self.get_camp(camp_id).await?;
        }
        self.store.update_pricing_item(&item).await?;
        info!(item_id = %id, "Pricing item updated");
        Ok(item)
    }

    /// Soft delete: hidden from new selections, kept for history
    pub async fn archive_pricing_item(&self, id: Uuid) -> CampResult<PricingItem> {
        let mut item = self.get_pricing_item(id).await?;
        item.is_active = false;
        item.updated_at = Utc::now();
        self.store.update_pricing_item(&item).await?;
        info!(item_id = %id, "Pricing item archived");
        Ok(item)
    }

    // ----- registrations ---------------------------------------------------

    pub async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> CampResult<Vec<Registration>> {
        self.store.list_registrations(filter).await
    }

    pub async fn get_registration(&self, id: Uuid) -> CampResult<Registration> {
        self.store
            .get_registration(id)
            .await?
            .ok_or_else(|| CampError::not_found("Registration", id))
    }

    /// Edit status and notes. Moving between spot-holding and
    /// non-holding statuses adjusts the camp counter.
    #[instrument(skip(self, patch))]
    pub async fn update_registration(
        &self,
        id: Uuid,
        patch: RegistrationPatch,
    ) -> CampResult<Registration> {
        let current = self.get_registration(id).await?;
        let mut next = current.clone();
        if let Some(status) = patch.registration_status {
            next.registration_status = status;
        }
        if let Some(notes) = patch.notes {
            next.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }
        next.updated_at = Utc::now();

        let spots = current.spot_count();
        let was_holding = current.holds_spot();
        let now_holding = next.holds_spot();

        // Take spots before the row claims them; give them back after.
        if !was_holding && now_holding {
            self.ledger.reserve(current.camp_id, spots).await?;
        }

        let written = self
            .store
            .update_registration(&next, &current)
            .await;
        if !matches!(written, Ok(true)) {
            if !was_holding && now_holding {
                self.ledger.release(current.camp_id, spots).await?;
            }
            written?;
            return Err(CampError::Conflict(format!(
                "Registration {} was modified concurrently",
                id
            )));
        }

        if was_holding && !now_holding {
            self.ledger.release(current.camp_id, spots).await?;
        }

        info!(
            from = current.registration_status.as_str(),
            to = next.registration_status.as_str(),
            "Registration updated"
        );
        Ok(next)
    }

    /// Explicit capacity cancellation
    pub async fn cancel_registration(&self, id: Uuid) -> CampResult<Registration> {
        let current = self.get_registration(id).await?;
        if current.registration_status == RegistrationStatus::Cancelled {
            return Ok(current);
        }
        self.update_registration(
            id,
            RegistrationPatch {
                registration_status: Some(RegistrationStatus::Cancelled),
                notes: None,
            },
        )
        .await
    }

    /// Privacy deletion: anonymize, keep the row, its amounts, and its spots
    #[instrument(skip(self))]
    pub async fn delete_registration(&self, id: Uuid) -> CampResult<Registration> {
        let current = self.get_registration(id).await?;
        if current.is_anonymized() {
            return Ok(current);
        }
        let mut next = current.clone();
        next.anonymize();
        if !self
            .store
            .update_registration(&next, &current)
            .await?
        {
            return Err(CampError::Conflict(format!(
                "Registration {} was modified concurrently",
                id
            )));
        }
        info!("Registration anonymized");
        Ok(next)
    }

    /// Intents whose payment went through but could not be honoured
    pub async fn list_conflicts(&self) -> CampResult<Vec<IntentRecord>> {
        Ok(self
            .store
            .list_intents(IntentState::Failed)
            .await?
            .into_iter()
            .filter(|record| record.payment_confirmed)
            .collect())
    }
}
