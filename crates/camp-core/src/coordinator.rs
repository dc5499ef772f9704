//! # Payment Coordinator
//!
//! Two-phase commit between an external payment and the local
//! registration row:
//!
//! ```text
//! create_intent ──> IntentCreated
//!                        │  (browser confirms with the provider)
//! finalize ─────> retrieve_intent == succeeded ?
//!                        │ yes                      no ──> NotConfirmed
//!                   claim (CAS) ──> ExternallyConfirmed
//!                        │
//!                   try_reserve ── rejected ──> Failed + operator alert
//!                        │
//!                   insert registration ── error ──> release, back to IntentCreated
//!                        │
//!                 RegistrationCommitted
//! ```
//!
//! Capacity is only reserved after the provider confirms the money moved,
//! so abandoned checkouts never hold spots.

use crate::camp::{Camp, CampAvailability};
use crate::error::{CampError, CampResult, CapacityError, PaymentError, ValidationError};
use crate::ledger::CapacityLedger;
use crate::money::Currency;
use crate::payment::{
    BoxedPaymentProcessor, IntentRecord, IntentRequest, IntentState, IntentStatus,
    IntentTransition, PaymentEvent, PaymentEventType,
};
use crate::pricing::{PriceBreakdown, PricingEngine, PricingItem, SelectedItem};
use crate::registration::{PaymentStatus, Registration, RegistrationPayload, Settlement};
use crate::store::{ReservationOutcome, SharedStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Body of `POST /api/create-payment-intent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub camp_id: Uuid,
    pub children_count: i32,
    #[serde(default)]
    pub selected_items: Vec<Uuid>,
    /// Client's own total. Only compared, never charged.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<Currency>,
}

/// What the client needs to confirm the payment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: Currency,
}

/// A server-side price for a camp and selection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub camp_id: Uuid,
    pub items: Vec<SelectedItem>,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
    pub currency: Currency,
}

/// A committed registration and the camp availability after it
#[derive(Debug, Clone)]
pub struct Finalized {
    pub registration: Registration,
    pub availability: CampAvailability,
}

#[derive(Clone)]
pub struct PaymentCoordinator {
    store: SharedStore,
    ledger: CapacityLedger,
    processor: BoxedPaymentProcessor,
    currency: Currency,
}

impl PaymentCoordinator {
    pub fn new(store: SharedStore, processor: BoxedPaymentProcessor, currency: Currency) -> Self {
        Self {
            ledger: CapacityLedger::new(store.clone()),
            store,
            processor,
            currency,
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn provider_name(&self) -> &'static str {
        self.processor.provider_name()
    }

    pub fn processor(&self) -> &BoxedPaymentProcessor {
        &self.processor
    }

    /// Authoritative price from stored camp and catalog state
    pub async fn quote(
        &self,
        camp: &Camp,
        children: i32,
        selected: &[Uuid],
    ) -> CampResult<Quote> {
        if children < 1 {
            return Err(
                ValidationError::field("childrenCount", "At least one child is required").into(),
            );
        }
        let catalog = self.store.list_pricing_items(false).await?;
        let items = PricingEngine::resolve_selection(&catalog, camp.id, selected)?;
        let breakdown =
            PricingEngine::compute_total(children as u32, &items, &camp.sibling_discount);
        Ok(Quote {
            camp_id: camp.id,
            items: items.iter().map(PricingItem::snapshot).collect(),
            breakdown,
            currency: self.currency,
        })
    }

    /// Price the registration and open a provider intent for it.
    ///
    /// Capacity is checked but not reserved.
    #[instrument(skip(self, request), fields(camp_id = %request.camp_id, children = request.children_count))]
    pub async fn create_intent(&self, request: &CreateIntentRequest) -> CampResult<CreatedIntent> {
        let camp = self
            .store
            .get_camp(request.camp_id)
            .await?
            .ok_or(CapacityError::CampNotFound)?;
        if request.children_count < 1 {
            return Err(
                ValidationError::field("childrenCount", "At least one child is required").into(),
            );
        }
        camp.admission_check(request.children_count)?;

        if let Some(currency) = request.currency {
            if currency != self.currency {
                return Err(ValidationError::field(
                    "currency",
                    format!("Payments are taken in {}", self.currency),
                )
                .into());
            }
        }

        let quote = self
            .quote(&camp, request.children_count, &request.selected_items)
            .await?;
        let total = quote.breakdown.total;

        if let Some(claimed) = request.amount {
            if claimed != total {
                warn!(claimed, total, "Client amount disagrees with server price");
                return Err(PaymentError::AmountMismatch {
                    expected: total,
                    actual: claimed,
                }
                .into());
            }
        }
        if total == 0 {
            return Err(ValidationError::field(
                "amount",
                "Nothing to pay; submit the registration without a payment intent",
            )
            .into());
        }

        let intent_request = IntentRequest::new(total, self.currency)
            .with_description(format!(
                "{} registration ({} {})",
                camp.name,
                request.children_count,
                if request.children_count == 1 { "child" } else { "children" }
            ))
            .with_metadata("camp_id", camp.id.to_string())
            .with_metadata("children_count", request.children_count.to_string());
        let intent = self.processor.create_intent(&intent_request).await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            PaymentError::ProviderError {
                provider: self.processor.provider_name().to_string(),
                message: "intent created without a client secret".to_string(),
            }
        })?;

        let now = Utc::now();
        let record = IntentRecord {
            intent_id: intent.id.clone(),
            camp_id: camp.id,
            amount: total,
            currency: self.currency,
            children_count: request.children_count,
            selected_items: quote.items,
            state: IntentState::IntentCreated,
            registration_id: None,
            failure_reason: None,
            payment_confirmed: false,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_intent(&record).await?;

        info!(intent_id = %intent.id, amount = total, "Payment intent created");

        Ok(CreatedIntent {
            client_secret,
            payment_intent_id: intent.id,
            amount: total,
            currency: self.currency,
        })
    }

    /// Commit a registration for a confirmed intent.
    ///
    /// Calling this again for an already committed intent returns the
    /// existing registration.
    #[instrument(skip(self, payload), fields(camp_id = %payload.camp_id))]
    pub async fn finalize(
        &self,
        intent_id: &str,
        payload: RegistrationPayload,
    ) -> CampResult<Finalized> {
        let record = self
            .store
            .get_intent(intent_id)
            .await?
            .ok_or_else(|| PaymentError::IntentNotFound {
                intent_id: intent_id.to_string(),
            })?;

        if record.camp_id != payload.camp_id {
            return Err(ValidationError::field(
                "campId",
                "Payment intent was created for a different camp",
            )
            .into());
        }

        // A failed record whose money never moved is re-checked with the
        // provider: a later attempt on the same intent may have succeeded.
        let claim_from = match record.state {
            IntentState::IntentCreated => IntentState::IntentCreated,
            IntentState::Failed if !record.payment_confirmed => IntentState::Failed,
            IntentState::RegistrationCommitted => return self.already_committed(&record).await,
            IntentState::ExternallyConfirmed => {
                return Err(CampError::Conflict(format!(
                    "Payment intent {} is already being finalized",
                    intent_id
                )))
            }
            IntentState::Failed => {
                return Err(CampError::Conflict(format!(
                    "Payment intent {} failed: {}",
                    intent_id,
                    record.failure_reason.as_deref().unwrap_or("unknown reason")
                )))
            }
        };

        let camp = self
            .store
            .get_camp(record.camp_id)
            .await?
            .ok_or(CapacityError::CampNotFound)?;
        payload.validate(Some(&camp))?;
        if payload.child_count() != record.children_count {
            return Err(ValidationError::field(
                "children",
                format!(
                    "Payment covers {} children but {} were submitted",
                    record.children_count,
                    payload.child_count()
                ),
            )
            .into());
        }

        // The provider is the only witness that the payment happened.
        let intent = self.processor.retrieve_intent(intent_id).await?;
        if !intent.status.is_succeeded() {
            if intent.status == IntentStatus::Canceled && claim_from == IntentState::IntentCreated {
                self.mark_failed(&record, claim_from, "payment canceled", false)
                    .await;
            }
            info!(intent_id, status = intent.status.as_str(), "Payment not confirmed");
            return Err(PaymentError::NotConfirmed {
                intent_id: intent_id.to_string(),
                status: intent.status.as_str().to_string(),
            }
            .into());
        }
        if intent.amount != record.amount {
            error!(
                intent_id,
                expected = record.amount,
                charged = intent.amount,
                operator_action = "refund_or_waitlist",
                "Provider amount differs from recorded amount"
            );
            self.mark_failed(&record, claim_from, "amount mismatch", true)
                .await;
            return Err(PaymentError::AmountMismatch {
                expected: record.amount,
                actual: intent.amount,
            }
            .into());
        }

        let claim = IntentTransition::new(claim_from, IntentState::ExternallyConfirmed)
            .with_payment_confirmed(true);
        if !self.store.transition_intent(intent_id, &claim).await? {
            return Err(CampError::Conflict(format!(
                "Payment intent {} is already being finalized",
                intent_id
            )));
        }
        if claim_from == IntentState::Failed {
            warn!(intent_id, "Previously failed intent succeeded at the provider");
        }
        info!(intent_id, "Payment confirmed externally");

        let spots = record.children_count;
        let availability = match self.ledger.try_reserve(record.camp_id, spots).await {
            Ok(ReservationOutcome::Reserved(availability)) => availability,
            Ok(ReservationOutcome::Rejected(reason)) => {
                error!(
                    intent_id,
                    camp_id = %record.camp_id,
                    spots,
                    reason = reason.code(),
                    operator_action = "refund_or_waitlist",
                    "Payment succeeded but no spot could be reserved"
                );
                self.mark_failed(&record, IntentState::ExternallyConfirmed, reason.code(), true)
                    .await;
                return Err(CampError::PostPaymentCapacityConflict {
                    intent_id: intent_id.to_string(),
                    reason,
                });
            }
            Err(e) => {
                self.revert_claim(intent_id).await;
                return Err(e);
            }
        };

        let settlement = Settlement {
            selected_items: record.selected_items.clone(),
            total_amount: record.amount,
            currency: record.currency,
            payment_status: PaymentStatus::Paid,
            payment_intent_id: Some(intent_id.to_string()),
        };
        let persisted = match Registration::confirmed(payload, settlement) {
            Ok(registration) => match self.store.insert_registration(&registration).await {
                Ok(()) => Ok(registration),
                Err(e) => Err(e),
            },
            Err(e) => Err(CampError::from(e)),
        };
        let registration = match persisted {
            Ok(registration) => registration,
            Err(e) => {
                warn!(intent_id, error = %e, "Registration write failed, compensating");
                if let Err(release_err) = self.ledger.release(record.camp_id, spots).await {
                    error!(
                        intent_id,
                        camp_id = %record.camp_id,
                        spots,
                        error = %release_err,
                        operator_action = "release_spots",
                        "Compensating release failed"
                    );
                }
                self.revert_claim(intent_id).await;
                return Err(e);
            }
        };

        let commit = IntentTransition::new(
            IntentState::ExternallyConfirmed,
            IntentState::RegistrationCommitted,
        )
        .with_registration(registration.id);
        match self.store.transition_intent(intent_id, &commit).await {
            Ok(true) => {}
            Ok(false) => warn!(intent_id, "Intent record moved during commit"),
            Err(e) => error!(
                intent_id,
                registration_id = %registration.id,
                error = %e,
                "Registration stored but intent record not marked committed"
            ),
        }

        info!(
            intent_id,
            registration_id = %registration.id,
            spots_left = availability.spots_left,
            "Registration committed"
        );

        Ok(Finalized {
            registration,
            availability,
        })
    }

    /// Log a verified provider event against our record. Never commits.
    #[instrument(skip(self, event), fields(event_id = %event.event_id))]
    pub async fn reconcile(&self, event: &PaymentEvent) -> CampResult<()> {
        let Some(intent_id) = event.intent_id.as_deref() else {
            debug!("Event carries no payment intent");
            return Ok(());
        };
        let Some(record) = self.store.get_intent(intent_id).await? else {
            warn!(intent_id, "Event for an intent we did not create");
            return Ok(());
        };

        match &event.event_type {
            PaymentEventType::IntentSucceeded => {
                if record.state == IntentState::RegistrationCommitted {
                    info!(intent_id, "Payment succeeded and registration is committed");
                } else {
                    warn!(
                        intent_id,
                        state = record.state.as_str(),
                        "Payment succeeded without a committed registration"
                    );
                }
            }
            // A declined attempt leaves the intent open for another card
            PaymentEventType::IntentFailed => {
                info!(
                    intent_id,
                    state = record.state.as_str(),
                    "Payment attempt failed; intent stays open"
                );
            }
            PaymentEventType::IntentCanceled => {
                if record.state == IntentState::IntentCreated {
                    self.mark_failed(&record, IntentState::IntentCreated, "payment canceled", false)
                        .await;
                }
                info!(intent_id, "Payment canceled");
            }
            PaymentEventType::Unknown(kind) => {
                debug!(intent_id, kind = %kind, "Ignoring event");
            }
        }
        Ok(())
    }

    async fn already_committed(&self, record: &IntentRecord) -> CampResult<Finalized> {
        let registration_id = record.registration_id.ok_or_else(|| {
            CampError::Storage(format!(
                "intent {} is committed without a registration id",
                record.intent_id
            ))
        })?;
        let registration = self
            .store
            .get_registration(registration_id)
            .await?
            .ok_or_else(|| CampError::not_found("Registration", registration_id))?;
        let availability = self.ledger.availability(record.camp_id).await?;
        info!(intent_id = %record.intent_id, "Finalize replayed for committed intent");
        Ok(Finalized {
            registration,
            availability,
        })
    }

    async fn mark_failed(
        &self,
        record: &IntentRecord,
        from: IntentState,
        reason: &str,
        payment_confirmed: bool,
    ) {
        let transition = IntentTransition::new(from, IntentState::Failed)
            .with_failure(reason)
            .with_payment_confirmed(payment_confirmed);
        match self.store.transition_intent(&record.intent_id, &transition).await {
            Ok(true) => info!(intent_id = %record.intent_id, reason, "Intent marked failed"),
            Ok(false) => debug!(intent_id = %record.intent_id, "Intent already moved on"),
            Err(e) => error!(intent_id = %record.intent_id, error = %e, "Could not mark intent failed"),
        }
    }

    async fn revert_claim(&self, intent_id: &str) {
        let transition =
            IntentTransition::new(IntentState::ExternallyConfirmed, IntentState::IntentCreated);
        match self.store.transition_intent(intent_id, &transition).await {
            Ok(_) => info!(intent_id, "Intent returned to created; finalize may be retried"),
            Err(e) => error!(intent_id, error = %e, "Could not revert intent claim"),
        }
    }
}
