//! # Capacity Ledger
//!
//! Owns `spots_taken <= max_spots` for every camp. All coordination goes
//! through the store's conditional increment; the ledger holds no state of
//! its own, so any number of request tasks can share one.

use crate::camp::CampAvailability;
use crate::error::{CampResult, CapacityError, ValidationError};
use crate::store::{ReservationOutcome, SharedStore};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct CapacityLedger {
    store: SharedStore,
}

impl CapacityLedger {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Reserve `spots` for `camp_id` or report why not.
    #[instrument(skip(self))]
    pub async fn try_reserve(&self, camp_id: Uuid, spots: i32) -> CampResult<ReservationOutcome> {
        if spots <= 0 {
            return Err(ValidationError::field("children", "At least one child is required").into());
        }

        let outcome = self.store.try_reserve(camp_id, spots).await?;
        match &outcome {
            ReservationOutcome::Reserved(availability) => info!(
                spots_left = availability.spots_left,
                taken = availability.total,
                "Spots reserved"
            ),
            ReservationOutcome::Rejected(reason) => {
                warn!(reason = reason.code(), "Reservation rejected")
            }
        }
        Ok(outcome)
    }

    /// Like `try_reserve`, with a rejection turned into an error
    pub async fn reserve(&self, camp_id: Uuid, spots: i32) -> CampResult<CampAvailability> {
        match self.try_reserve(camp_id, spots).await? {
            ReservationOutcome::Reserved(availability) => Ok(availability),
            ReservationOutcome::Rejected(reason) => Err(reason.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn release(&self, camp_id: Uuid, spots: i32) -> CampResult<()> {
        if spots <= 0 {
            return Ok(());
        }
        self.store.release(camp_id, spots).await?;
        info!("Spots released");
        Ok(())
    }

    /// Current availability. Read-only.
    pub async fn availability(&self, camp_id: Uuid) -> CampResult<CampAvailability> {
        let camp = self
            .store
            .get_camp(camp_id)
            .await?
            .ok_or(CapacityError::CampNotFound)?;
        debug!(%camp_id, spots_taken = camp.spots_taken, "Availability read");
        Ok(camp.availability())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camp::tests::draft;
    use crate::error::CampError;
    use crate::store::{MemoryStore, RegistrationStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reserve_and_release() {
        let store = Arc::new(MemoryStore::new());
        let camp = draft(2).into_camp(30).unwrap();
        store.insert_camp(&camp).await.unwrap();
        let ledger = CapacityLedger::new(store);

        let availability = ledger.reserve(camp.id, 2).await.unwrap();
        assert!(availability.is_full);

        let err = ledger.reserve(camp.id, 1).await.unwrap_err();
        assert_eq!(err.code(), "full");

        ledger.release(camp.id, 1).await.unwrap();
        assert_eq!(ledger.availability(camp.id).await.unwrap().spots_left, 1);
    }

    #[tokio::test]
    async fn test_zero_spots_is_validation_error() {
        let ledger = CapacityLedger::new(Arc::new(MemoryStore::new()));
        let err = ledger.try_reserve(Uuid::new_v4(), 0).await.unwrap_err();
        assert!(matches!(err, CampError::Validation(_)));
    }

    #[tokio::test]
    async fn test_availability_unknown_camp() {
        let ledger = CapacityLedger::new(Arc::new(MemoryStore::new()));
        let err = ledger.availability(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
