//! # Registration Store
//!
//! Durable CRUD for camps, pricing items, registrations, payment intent
//! records and admin settings.
//!
//! The one operation with a concurrency contract is `try_reserve`: it must
//! check-and-increment `spots_taken` as a single indivisible step. A read
//! followed by an unconditional write is not an acceptable implementation.

use crate::camp::{Camp, CampAvailability};
use crate::error::{CampResult, CapacityError};
use crate::payment::{IntentRecord, IntentState, IntentTransition};
use crate::pricing::PricingItem;
use crate::registration::{Registration, RegistrationFilter};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;

pub use memory::MemoryStore;

/// Outcome of a conditional capacity increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Committed; availability as of the increment
    Reserved(CampAvailability),
    /// Nothing was written
    Rejected(CapacityError),
}

impl ReservationOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved(_))
    }
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    // ----- camps -----------------------------------------------------------

    async fn list_camps(&self, include_archived: bool) -> CampResult<Vec<Camp>>;

    async fn get_camp(&self, id: Uuid) -> CampResult<Option<Camp>>;

    async fn insert_camp(&self, camp: &Camp) -> CampResult<()>;

    /// Write admin-editable fields. Never touches `spots_taken` or the
    /// archived flag. Returns `false` when `camp.max_spots` would fall
    /// below the stored `spots_taken`; that check happens atomically with
    /// the write.
    async fn update_camp(&self, camp: &Camp) -> CampResult<bool>;

    /// Soft delete / restore. Returns the updated camp.
    async fn set_camp_archived(&self, id: Uuid, archived: bool) -> CampResult<Option<Camp>>;

    // ----- capacity --------------------------------------------------------

    /// Atomically add `spots` to `spots_taken` if the camp is open, not
    /// archived, and the result stays within `max_spots`.
    async fn try_reserve(&self, camp_id: Uuid, spots: i32) -> CampResult<ReservationOutcome>;

    /// Atomically subtract `spots`, flooring at zero.
    async fn release(&self, camp_id: Uuid, spots: i32) -> CampResult<()>;

    // ----- pricing ---------------------------------------------------------

    async fn list_pricing_items(&self, include_archived: bool) -> CampResult<Vec<PricingItem>>;

    async fn get_pricing_item(&self, id: Uuid) -> CampResult<Option<PricingItem>>;

    async fn insert_pricing_item(&self, item: &PricingItem) -> CampResult<()>;

    async fn update_pricing_item(&self, item: &PricingItem) -> CampResult<()>;

    // ----- registrations ---------------------------------------------------

    /// Newest first
    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> CampResult<Vec<Registration>>;

    async fn get_registration(&self, id: Uuid) -> CampResult<Option<Registration>>;

    async fn insert_registration(&self, registration: &Registration) -> CampResult<()>;

    /// Overwrite the row if it still matches the `expected` version the
    /// caller read: same status and same `updated_at` stamp. Returns
    /// `false` (and writes nothing) otherwise.
    async fn update_registration(
        &self,
        registration: &Registration,
        expected: &Registration,
    ) -> CampResult<bool>;

    // ----- payment intents -------------------------------------------------

    async fn insert_intent(&self, record: &IntentRecord) -> CampResult<()>;

    async fn get_intent(&self, intent_id: &str) -> CampResult<Option<IntentRecord>>;

    /// Compare-and-set on the record state. Returns `false` when the
    /// record is missing or not in `transition.from`.
    async fn transition_intent(
        &self,
        intent_id: &str,
        transition: &IntentTransition,
    ) -> CampResult<bool>;

    async fn list_intents(&self, state: IntentState) -> CampResult<Vec<IntentRecord>>;

    // ----- admin settings --------------------------------------------------

    async fn get_setting(&self, key: &str) -> CampResult<Option<String>>;

    async fn put_setting(&self, key: &str, value: &str) -> CampResult<()>;
}

/// Type alias for a shared store (dynamic dispatch)
pub type SharedStore = Arc<dyn RegistrationStore>;
