//! # Registration Workflow
//!
//! One method per public operation. Ties the capacity ledger, pricing
//! engine and payment coordinator together; holds no request state.

use crate::camp::{Camp, CampAvailability};
use crate::coordinator::{CreateIntentRequest, CreatedIntent, PaymentCoordinator, Quote};
use crate::error::{CampError, CampResult, CapacityError, PaymentError};
use crate::ledger::CapacityLedger;
use crate::money::{format_minor_units, Currency};
use crate::payment::BoxedPaymentProcessor;
use crate::pricing::PricingItem;
use crate::registration::{
    PaymentStatus, Registration, RegistrationPayload, RegistrationReceipt, Settlement,
};
use crate::store::SharedStore;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const DEFAULT_WAITLIST_MESSAGE: &str =
    "This camp is full. Contact us to be added to the waitlist.";

#[derive(Clone)]
pub struct RegistrationWorkflow {
    store: SharedStore,
    ledger: CapacityLedger,
    coordinator: PaymentCoordinator,
}

impl RegistrationWorkflow {
    pub fn new(store: SharedStore, processor: BoxedPaymentProcessor, currency: Currency) -> Self {
        Self {
            ledger: CapacityLedger::new(store.clone()),
            coordinator: PaymentCoordinator::new(store.clone(), processor, currency),
            store,
        }
    }

    pub fn coordinator(&self) -> &PaymentCoordinator {
        &self.coordinator
    }

    /// `{spotsLeft, total, max, isFull}`; never writes
    pub async fn get_status(&self, camp_id: Uuid) -> CampResult<CampAvailability> {
        self.ledger.availability(camp_id).await
    }

    pub async fn list_camps(&self, include_archived: bool) -> CampResult<Vec<Camp>> {
        self.store.list_camps(include_archived).await
    }

    pub async fn list_pricing(&self, include_archived: bool) -> CampResult<Vec<PricingItem>> {
        self.store.list_pricing_items(include_archived).await
    }

    pub async fn quote(
        &self,
        camp_id: Uuid,
        children: i32,
        selected: &[Uuid],
    ) -> CampResult<Quote> {
        let camp = self.load_camp(camp_id).await?;
        self.coordinator.quote(&camp, children, selected).await
    }

    pub async fn create_payment_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> CampResult<CreatedIntent> {
        self.coordinator.create_intent(request).await
    }

    /// Paid submissions carry `paymentIntentId` and go through finalize;
    /// the rest must price to zero.
    pub async fn submit(&self, payload: RegistrationPayload) -> CampResult<RegistrationReceipt> {
        match payload.payment_intent_id.clone() {
            Some(intent_id) if !intent_id.trim().is_empty() => {
                let done = self.coordinator.finalize(intent_id.trim(), payload).await?;
                Ok(RegistrationReceipt::new(&done.registration, done.availability))
            }
            _ => self.submit_free(payload).await,
        }
    }

    #[instrument(skip(self, payload), fields(camp_id = %payload.camp_id, children = payload.children.len()))]
    pub async fn submit_free(&self, payload: RegistrationPayload) -> CampResult<RegistrationReceipt> {
        let camp = self.load_camp(payload.camp_id).await?;
        payload.validate(Some(&camp))?;

        let quote = self
            .coordinator
            .quote(&camp, payload.child_count(), &payload.selected_items)
            .await?;
        if quote.breakdown.total != 0 {
            return Err(PaymentError::InvalidRequest(format!(
                "Payment of {} is required; create a payment intent first",
                format_minor_units(quote.breakdown.total, quote.currency)
            ))
            .into());
        }

        let spots = payload.child_count();
        let availability = self.ledger.reserve(camp.id, spots).await?;

        let settlement = Settlement {
            selected_items: quote.items,
            total_amount: 0,
            currency: quote.currency,
            payment_status: PaymentStatus::Free,
            payment_intent_id: None,
        };
        let written = match Registration::confirmed(payload, settlement) {
            Ok(registration) => match self.store.insert_registration(&registration).await {
                Ok(()) => Ok(registration),
                Err(e) => Err(e),
            },
            Err(e) => Err(CampError::from(e)),
        };
        let registration = match written {
            Ok(registration) => registration,
            Err(e) => {
                warn!(error = %e, "Free registration write failed, releasing spots");
                if let Err(release_err) = self.ledger.release(camp.id, spots).await {
                    error!(
                        camp_id = %camp.id,
                        spots,
                        error = %release_err,
                        operator_action = "release_spots",
                        "Compensating release failed"
                    );
                }
                return Err(e);
            }
        };

        info!(registration_id = %registration.id, "Free registration committed");
        Ok(RegistrationReceipt::new(&registration, availability))
    }

    /// Waitlist message to show after a `CampFull` rejection
    pub async fn waitlist_hint(&self, camp_id: Uuid) -> Option<String> {
        match self.store.get_camp(camp_id).await {
            Ok(Some(camp)) if camp.waitlist_enabled => Some(
                camp.waitlist_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_WAITLIST_MESSAGE.to_string()),
            ),
            _ => None,
        }
    }

    async fn load_camp(&self, camp_id: Uuid) -> CampResult<Camp> {
        self.store
            .get_camp(camp_id)
            .await?
            .ok_or_else(|| CapacityError::CampNotFound.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camp::tests::draft;
    use crate::camp::{RegistrationWindow, SiblingDiscount};
    use crate::payment::{IntentStatus, MockPaymentProcessor};
    use crate::pricing::tests::item;
    use crate::registration::tests::payload;
    use crate::store::memory::tests::FlakyStore;
    use crate::store::{MemoryStore, RegistrationStore};
    use std::sync::Arc;

    async fn setup(
        max_spots: i32,
        fee: Option<i64>,
    ) -> (
        Arc<MemoryStore>,
        Arc<MockPaymentProcessor>,
        RegistrationWorkflow,
        Camp,
    ) {
        let store = Arc::new(MemoryStore::new());
        let mut d = draft(max_spots);
        d.waitlist_enabled = true;
        d.waitlist_message = Some("Email the office to join the waitlist".to_string());
        let camp = d.into_camp(30).unwrap();
        store.insert_camp(&camp).await.unwrap();
        if let Some(fee) = fee {
            store.insert_pricing_item(&item(fee, true)).await.unwrap();
        }
        let mock = MockPaymentProcessor::shared();
        let workflow = RegistrationWorkflow::new(store.clone(), mock.clone(), Currency::USD);
        (store, mock, workflow, camp)
    }

    #[tokio::test]
    async fn test_status_read_is_idempotent() {
        let (_, _, workflow, camp) = setup(5, None).await;
        let first = workflow.get_status(camp.id).await.unwrap();
        let second = workflow.get_status(camp.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.spots_left, 5);
        assert!(!first.is_full);
    }

    #[tokio::test]
    async fn test_free_submission() {
        let (store, _, workflow, camp) = setup(5, None).await;
        let receipt = workflow.submit(payload(camp.id, 2)).await.unwrap();
        assert_eq!(receipt.spots_left, 3);
        assert_eq!(receipt.total, 2);
        assert_eq!(receipt.max, 5);
        assert_eq!(receipt.payment_status, PaymentStatus::Free);

        let stored = store.get_registration(receipt.id).await.unwrap().unwrap();
        assert_eq!(stored.total_amount, 0);
    }

    #[tokio::test]
    async fn test_fully_discounted_is_free() {
        let (store, _, _, _) = setup(5, None).await;
        let mut d = draft(5);
        d.sibling_discount = SiblingDiscount::percentage(100);
        let camp = d.into_camp(30).unwrap();
        store.insert_camp(&camp).await.unwrap();
        let mut coupon = item(-10_000, true);
        coupon.camp_id = Some(camp.id);
        store.insert_pricing_item(&coupon).await.unwrap();

        let workflow =
            RegistrationWorkflow::new(store.clone(), MockPaymentProcessor::shared(), Currency::USD);
        let receipt = workflow.submit(payload(camp.id, 1)).await.unwrap();
        assert_eq!(receipt.total_amount, 0);
    }

    #[tokio::test]
    async fn test_priced_submission_needs_intent() {
        let (store, _, workflow, camp) = setup(5, Some(15_000)).await;
        let err = workflow.submit(payload(camp.id, 1)).await.unwrap_err();
        assert!(matches!(err, CampError::Payment(PaymentError::InvalidRequest(_))));
        assert_eq!(store.get_camp(camp.id).await.unwrap().unwrap().spots_taken, 0);
    }

    #[tokio::test]
    async fn test_full_camp_rejects_without_write() {
        let (store, _, workflow, camp) = setup(1, None).await;
        let err = workflow.submit(payload(camp.id, 2)).await.unwrap_err();
        assert_eq!(err.code(), "full");
        assert!(store
            .list_registrations(&Default::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            workflow.waitlist_hint(camp.id).await.as_deref(),
            Some("Email the office to join the waitlist")
        );
    }

    #[tokio::test]
    async fn test_paused_camp_rejected() {
        let (store, _, workflow, mut camp) = setup(5, None).await;
        camp.registration_status = RegistrationWindow::Paused;
        store.update_camp(&camp).await.unwrap();
        let err = workflow.submit(payload(camp.id, 1)).await.unwrap_err();
        assert_eq!(err.code(), "registration_closed");
    }

    #[tokio::test]
    async fn test_invalid_payload_writes_nothing() {
        let (store, _, workflow, camp) = setup(5, None).await;
        let mut p = payload(camp.id, 1);
        p.permissions.liability_waiver = false;
        let err = workflow.submit(p).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.get_camp(camp.id).await.unwrap().unwrap().spots_taken, 0);
    }

    #[tokio::test]
    async fn test_paid_flow() {
        let (_, mock, workflow, camp) = setup(5, Some(15_000)).await;
        let created = workflow
            .create_payment_intent(&CreateIntentRequest {
                camp_id: camp.id,
                children_count: 1,
                selected_items: Vec::new(),
                amount: Some(15_000),
                currency: Some(Currency::USD),
            })
            .await
            .unwrap();
        mock.set_status(&created.payment_intent_id, IntentStatus::Succeeded)
            .unwrap();

        let mut p = payload(camp.id, 1);
        p.payment_intent_id = Some(created.payment_intent_id);
        p.payment_status = Some(PaymentStatus::Paid);
        let receipt = workflow.submit(p).await.unwrap();
        assert_eq!(receipt.payment_status, PaymentStatus::Paid);
        assert_eq!(receipt.total_amount, 15_000);
        assert_eq!(receipt.spots_left, 4);
    }

    #[tokio::test]
    async fn test_client_claimed_paid_status_is_ignored() {
        let (store, _, workflow, camp) = setup(5, Some(15_000)).await;
        let mut p = payload(camp.id, 1);
        p.payment_status = Some(PaymentStatus::Paid);
        assert!(workflow.submit(p).await.is_err());
        assert_eq!(store.get_camp(camp.id).await.unwrap().unwrap().spots_taken, 0);
    }

    #[tokio::test]
    async fn test_quote() {
        let (_, _, workflow, camp) = setup(5, Some(10_000)).await;
        let quote = workflow.quote(camp.id, 3, &[]).await.unwrap();
        assert_eq!(quote.breakdown.total, 30_000);
        assert_eq!(quote.items.len(), 1);
    }

    #[tokio::test]
    async fn test_free_write_failure_releases_spots() {
        let store = Arc::new(FlakyStore::default());
        let camp = draft(3).into_camp(30).unwrap();
        store.insert_camp(&camp).await.unwrap();
        let workflow =
            RegistrationWorkflow::new(store.clone(), MockPaymentProcessor::shared(), Currency::USD);

        store.fail_registration_inserts(true);
        let err = workflow.submit(payload(camp.id, 2)).await.unwrap_err();
        assert_eq!(err.code(), "storage");
        assert_eq!(store.get_camp(camp.id).await.unwrap().unwrap().spots_taken, 0);

        store.fail_registration_inserts(false);
        let receipt = workflow.submit(payload(camp.id, 2)).await.unwrap();
        assert_eq!(receipt.spots_left, 1);
        assert_eq!(store.get_camp(camp.id).await.unwrap().unwrap().spots_taken, 2);
    }
}
