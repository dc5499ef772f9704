//! In-memory `RegistrationStore`.
//!
//! Backs tests and local development. All tables sit behind one async
//! mutex, so every trait method is a serializable transaction.

use super::{RegistrationStore, ReservationOutcome};
use crate::camp::{Camp, CampStatus};
use crate::error::{CampResult, CapacityError};
use crate::payment::{IntentRecord, IntentState, IntentTransition};
use crate::pricing::PricingItem;
use crate::registration::{Registration, RegistrationFilter};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    camps: HashMap<Uuid, Camp>,
    pricing: HashMap<Uuid, PricingItem>,
    registrations: HashMap<Uuid, Registration>,
    intents: HashMap<String, IntentRecord>,
    settings: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn list_camps(&self, include_archived: bool) -> CampResult<Vec<Camp>> {
        let tables = self.tables.lock().await;
        let mut camps: Vec<Camp> = tables
            .camps
            .values()
            .filter(|c| include_archived || !c.is_archived())
            .cloned()
            .collect();
        camps.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.name.cmp(&b.name)));
        Ok(camps)
    }

    async fn get_camp(&self, id: Uuid) -> CampResult<Option<Camp>> {
        Ok(self.tables.lock().await.camps.get(&id).cloned())
    }

    async fn insert_camp(&self, camp: &Camp) -> CampResult<()> {
        self.tables.lock().await.camps.insert(camp.id, camp.clone());
        Ok(())
    }

    async fn update_camp(&self, camp: &Camp) -> CampResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.camps.get_mut(&camp.id) else {
            return Ok(false);
        };
        if camp.max_spots < stored.spots_taken {
            return Ok(false);
        }
        let spots_taken = stored.spots_taken;
        let archived = stored.is_archived();
        *stored = Camp {
            spots_taken,
            status: if archived {
                CampStatus::Archived
            } else {
                camp.status
            },
            updated_at: Utc::now(),
            ..camp.clone()
        };
        stored.refresh_fill_status();
        Ok(true)
    }

    async fn set_camp_archived(&self, id: Uuid, archived: bool) -> CampResult<Option<Camp>> {
        let mut tables = self.tables.lock().await;
        let Some(camp) = tables.camps.get_mut(&id) else {
            return Ok(None);
        };
        if archived {
            camp.status = CampStatus::Archived;
        } else if camp.is_archived() {
            camp.status = CampStatus::Active;
            camp.refresh_fill_status();
        }
        camp.updated_at = Utc::now();
        Ok(Some(camp.clone()))
    }

    async fn try_reserve(&self, camp_id: Uuid, spots: i32) -> CampResult<ReservationOutcome> {
        let mut tables = self.tables.lock().await;
        let Some(camp) = tables.camps.get_mut(&camp_id) else {
            return Ok(ReservationOutcome::Rejected(CapacityError::CampNotFound));
        };
        if let Err(reason) = camp.admission_check(spots) {
            return Ok(ReservationOutcome::Rejected(reason));
        }
        camp.apply_reservation(spots);
        Ok(ReservationOutcome::Reserved(camp.availability()))
    }

    async fn release(&self, camp_id: Uuid, spots: i32) -> CampResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(camp) = tables.camps.get_mut(&camp_id) {
            camp.apply_release(spots);
        }
        Ok(())
    }

    async fn list_pricing_items(&self, include_archived: bool) -> CampResult<Vec<PricingItem>> {
        let tables = self.tables.lock().await;
        let mut items: Vec<PricingItem> = tables
            .pricing
            .values()
            .filter(|i| include_archived || i.is_active)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(items)
    }

    async fn get_pricing_item(&self, id: Uuid) -> CampResult<Option<PricingItem>> {
        Ok(self.tables.lock().await.pricing.get(&id).cloned())
    }

    async fn insert_pricing_item(&self, item: &PricingItem) -> CampResult<()> {
        self.tables.lock().await.pricing.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_pricing_item(&self, item: &PricingItem) -> CampResult<()> {
        self.tables.lock().await.pricing.insert(item.id, item.clone());
        Ok(())
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> CampResult<Vec<Registration>> {
        let tables = self.tables.lock().await;
        let mut registrations: Vec<Registration> = tables
            .registrations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        registrations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(registrations)
    }

    async fn get_registration(&self, id: Uuid) -> CampResult<Option<Registration>> {
        Ok(self.tables.lock().await.registrations.get(&id).cloned())
    }

    async fn insert_registration(&self, registration: &Registration) -> CampResult<()> {
        self.tables
            .lock()
            .await
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn update_registration(
        &self,
        registration: &Registration,
        expected: &Registration,
    ) -> CampResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.registrations.get_mut(&registration.id) {
            Some(stored)
                if stored.registration_status == expected.registration_status
                    && stored.updated_at == expected.updated_at =>
            {
                *stored = registration.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_intent(&self, record: &IntentRecord) -> CampResult<()> {
        self.tables
            .lock()
            .await
            .intents
            .insert(record.intent_id.clone(), record.clone());
        Ok(())
    }

    async fn get_intent(&self, intent_id: &str) -> CampResult<Option<IntentRecord>> {
        Ok(self.tables.lock().await.intents.get(intent_id).cloned())
    }

    async fn transition_intent(
        &self,
        intent_id: &str,
        transition: &IntentTransition,
    ) -> CampResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.intents.get_mut(intent_id) {
            Some(record) if record.state == transition.from => {
                transition.apply(record);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_intents(&self, state: IntentState) -> CampResult<Vec<IntentRecord>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<IntentRecord> = tables
            .intents
            .values()
            .filter(|r| r.state == state)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn get_setting(&self, key: &str) -> CampResult<Option<String>> {
        Ok(self.tables.lock().await.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> CampResult<()> {
        self.tables
            .lock()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::camp::tests::draft;
    use crate::camp::RegistrationWindow;
    use crate::error::CampError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// `MemoryStore` whose registration inserts can be switched off
    #[derive(Default)]
    pub(crate) struct FlakyStore {
        inner: MemoryStore,
        fail_registration_inserts: AtomicBool,
    }

    impl FlakyStore {
        pub(crate) fn fail_registration_inserts(&self, fail: bool) {
            self.fail_registration_inserts.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RegistrationStore for FlakyStore {
        async fn list_camps(&self, include_archived: bool) -> CampResult<Vec<Camp>> {
            self.inner.list_camps(include_archived).await
        }

        async fn get_camp(&self, id: Uuid) -> CampResult<Option<Camp>> {
            self.inner.get_camp(id).await
        }

        async fn insert_camp(&self, camp: &Camp) -> CampResult<()> {
            self.inner.insert_camp(camp).await
        }

        async fn update_camp(&self, camp: &Camp) -> CampResult<bool> {
            self.inner.update_camp(camp).await
        }

        async fn set_camp_archived(&self, id: Uuid, archived: bool) -> CampResult<Option<Camp>> {
            self.inner.set_camp_archived(id, archived).await
        }

        async fn try_reserve(&self, camp_id: Uuid, spots: i32) -> CampResult<ReservationOutcome> {
            self.inner.try_reserve(camp_id, spots).await
        }

        async fn release(&self, camp_id: Uuid, spots: i32) -> CampResult<()> {
            self.inner.release(camp_id, spots).await
        }

        async fn list_pricing_items(&self, include_archived: bool) -> CampResult<Vec<PricingItem>> {
            self.inner.list_pricing_items(include_archived).await
        }

        async fn get_pricing_item(&self, id: Uuid) -> CampResult<Option<PricingItem>> {
            self.inner.get_pricing_item(id).await
        }

        async fn insert_pricing_item(&self, item: &PricingItem) -> CampResult<()> {
            self.inner.insert_pricing_item(item).await
        }

        async fn update_pricing_item(&self, item: &PricingItem) -> CampResult<()> {
            self.inner.update_pricing_item(item).await
        }

        async fn list_registrations(
            &self,
            filter: &RegistrationFilter,
        ) -> CampResult<Vec<Registration>> {
            self.inner.list_registrations(filter).await
        }

        async fn get_registration(&self, id: Uuid) -> CampResult<Option<Registration>> {
            self.inner.get_registration(id).await
        }

        async fn insert_registration(&self, registration: &Registration) -> CampResult<()> {
            if self.fail_registration_inserts.load(Ordering::SeqCst) {
                return Err(CampError::Storage("registrations unavailable".to_string()));
            }
            self.inner.insert_registration(registration).await
        }

        async fn update_registration(
            &self,
            registration: &Registration,
            expected: &Registration,
        ) -> CampResult<bool> {
            self.inner.update_registration(registration, expected).await
        }

        async fn insert_intent(&self, record: &IntentRecord) -> CampResult<()> {
            self.inner.insert_intent(record).await
        }

        async fn get_intent(&self, intent_id: &str) -> CampResult<Option<IntentRecord>> {
            self.inner.get_intent(intent_id).await
        }

        async fn transition_intent(
            &self,
            intent_id: &str,
            transition: &IntentTransition,
        ) -> CampResult<bool> {
            self.inner.transition_intent(intent_id, transition).await
        }

        async fn list_intents(&self, state: IntentState) -> CampResult<Vec<IntentRecord>> {
            self.inner.list_intents(state).await
        }

        async fn get_setting(&self, key: &str) -> CampResult<Option<String>> {
            self.inner.get_setting(key).await
        }

        async fn put_setting(&self, key: &str, value: &str) -> CampResult<()> {
            self.inner.put_setting(key, value).await
        }
    }

    async fn store_with_camp(max_spots: i32) -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let camp = draft(max_spots).into_camp(30).unwrap();
        store.insert_camp(&camp).await.unwrap();
        (store, camp.id)
    }

    #[tokio::test]
    async fn test_reserve_until_full() {
        let (store, id) = store_with_camp(3).await;

        let outcome = store.try_reserve(id, 2).await.unwrap();
        assert_eq!(
            outcome,
            ReservationOutcome::Reserved(crate::camp::CampAvailability {
                spots_left: 1,
                total: 2,
                max: 3,
                is_full: false,
            })
        );

        assert_eq!(
            store.try_reserve(id, 2).await.unwrap(),
            ReservationOutcome::Rejected(CapacityError::CampFull)
        );
        assert!(store.try_reserve(id, 1).await.unwrap().is_reserved());

        let camp = store.get_camp(id).await.unwrap().unwrap();
        assert_eq!(camp.spots_taken, 3);
        assert_eq!(camp.status, CampStatus::Full);
    }

    #[tokio::test]
    async fn test_reserve_rejections() {
        let (store, id) = store_with_camp(5).await;
        assert_eq!(
            store.try_reserve(Uuid::new_v4(), 1).await.unwrap(),
            ReservationOutcome::Rejected(CapacityError::CampNotFound)
        );

        let mut camp = store.get_camp(id).await.unwrap().unwrap();
        camp.registration_status = RegistrationWindow::Closed;
        assert!(store.update_camp(&camp).await.unwrap());
        assert_eq!(
            store.try_reserve(id, 1).await.unwrap(),
            ReservationOutcome::Rejected(CapacityError::RegistrationClosed)
        );

        store.set_camp_archived(id, true).await.unwrap();
        assert_eq!(
            store.try_reserve(id, 1).await.unwrap(),
            ReservationOutcome::Rejected(CapacityError::CampArchived)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_oversell() {
        let (store, id) = store_with_camp(10).await;
        store.try_reserve(id, 3).await.unwrap();

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.try_reserve(id, 1).await.unwrap() })
            })
            .collect();

        let mut reserved = 0;
        let mut full = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ReservationOutcome::Reserved(_) => reserved += 1,
                ReservationOutcome::Rejected(CapacityError::CampFull) => full += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(reserved, 7);
        assert_eq!(full, 33);
        assert_eq!(store.get_camp(id).await.unwrap().unwrap().spots_taken, 10);
    }

    #[tokio::test]
    async fn test_release_floors_at_zero() {
        let (store, id) = store_with_camp(2).await;
        store.try_reserve(id, 2).await.unwrap();
        store.release(id, 5).await.unwrap();

        let camp = store.get_camp(id).await.unwrap().unwrap();
        assert_eq!(camp.spots_taken, 0);
        assert_eq!(camp.status, CampStatus::Active);
    }

    #[tokio::test]
    async fn test_update_camp_keeps_counter() {
        let (store, id) = store_with_camp(5).await;
        store.try_reserve(id, 4).await.unwrap();

        let mut stale = store.get_camp(id).await.unwrap().unwrap();
        stale.spots_taken = 0;
        stale.max_spots = 3;
        assert!(!store.update_camp(&stale).await.unwrap());

        stale.max_spots = 4;
        stale.name = "Renamed".to_string();
        assert!(store.update_camp(&stale).await.unwrap());

        let camp = store.get_camp(id).await.unwrap().unwrap();
        assert_eq!(camp.spots_taken, 4);
        assert_eq!(camp.name, "Renamed");
        assert_eq!(camp.status, CampStatus::Full);
    }

    #[tokio::test]
    async fn test_archive_and_restore() {
        let (store, id) = store_with_camp(1).await;
        store.try_reserve(id, 1).await.unwrap();

        let archived = store.set_camp_archived(id, true).await.unwrap().unwrap();
        assert!(archived.is_archived());
        assert!(store.list_camps(false).await.unwrap().is_empty());
        assert_eq!(store.list_camps(true).await.unwrap().len(), 1);

        let restored = store.set_camp_archived(id, false).await.unwrap().unwrap();
        assert_eq!(restored.status, CampStatus::Full);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get_setting("default_max_spots").await.unwrap(), None);
        store.put_setting("default_max_spots", "40").await.unwrap();
        assert_eq!(
            store.get_setting("default_max_spots").await.unwrap().as_deref(),
            Some("40")
        );
    }
}
