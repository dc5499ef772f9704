//! # Payment Processor Trait
//!
//! The external payment capability, seen from the registration side:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PaymentProcessor (trait)                    │
//! │  ├── create_intent(amount)  -> intent id + client secret    │
//! │  ├── retrieve_intent(id)    -> succeeded | not yet | failed │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!              ┌─────────────┴─────────────┐
//!      ┌───────┴────────┐         ┌────────┴────────┐
//!      │ StripeIntent   │         │ MockPayment     │
//!      │   Processor    │         │   Processor     │
//!      └────────────────┘         └─────────────────┘
//! ```
//!
//! Also holds the locally persisted `IntentRecord` that tracks each intent
//! through the commit workflow.

use crate::error::{PaymentError, PaymentResult};
use crate::money::Currency;
use crate::pricing::SelectedItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Provider-side status of a payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, IntentStatus::Succeeded)
    }
}

impl FromStr for IntentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requires_payment_method" => Ok(IntentStatus::RequiresPaymentMethod),
            "requires_confirmation" => Ok(IntentStatus::RequiresConfirmation),
            "requires_action" => Ok(IntentStatus::RequiresAction),
            "processing" => Ok(IntentStatus::Processing),
            "requires_capture" => Ok(IntentStatus::RequiresCapture),
            "succeeded" => Ok(IntentStatus::Succeeded),
            "canceled" => Ok(IntentStatus::Canceled),
            other => Err(PaymentError::Serialization(format!(
                "Unknown intent status: {}",
                other
            ))),
        }
    }
}

/// What we ask the provider to authorize
#[derive(Debug, Clone)]
pub struct IntentRequest {
    /// Minor units, already recomputed server-side
    pub amount: i64,
    pub currency: Currency,
    /// Sent as the provider idempotency key
    pub idempotency_key: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

impl IntentRequest {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            idempotency_key: Uuid::new_v4().to_string(),
            description: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A provider payment intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Handed to the browser to confirm the payment; only on creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
}

/// Webhook event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    IntentSucceeded,
    IntentFailed,
    IntentCanceled,
    Unknown(String),
}

/// A verified provider webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub event_type: PaymentEventType,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a payment intent for `request.amount`.
    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<PaymentIntent>;

    /// Fetch the current provider-side state of an intent.
    ///
    /// This is the only source of truth for "the payment succeeded".
    async fn retrieve_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent>;

    /// Verify a webhook signature and parse the event.
    async fn verify_webhook(&self, payload: &[u8], signature: &str)
        -> PaymentResult<PaymentEvent>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;

    /// Get the webhook endpoint path for this provider.
    fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.provider_name())
    }
}

/// Type alias for a shared payment processor (dynamic dispatch)
pub type BoxedPaymentProcessor = Arc<dyn PaymentProcessor>;

/// Where an intent is in the commit workflow.
///
/// ```text
/// (no record) -> IntentCreated -> ExternallyConfirmed -> RegistrationCommitted
///                      └──────────────┴──> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    IntentCreated,
    ExternallyConfirmed,
    RegistrationCommitted,
    Failed,
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentState::IntentCreated => "intent_created",
            IntentState::ExternallyConfirmed => "externally_confirmed",
            IntentState::RegistrationCommitted => "registration_committed",
            IntentState::Failed => "failed",
        }
    }
}

impl FromStr for IntentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intent_created" => Ok(IntentState::IntentCreated),
            "externally_confirmed" => Ok(IntentState::ExternallyConfirmed),
            "registration_committed" => Ok(IntentState::RegistrationCommitted),
            "failed" => Ok(IntentState::Failed),
            other => Err(format!("Unknown intent state: {}", other)),
        }
    }
}

/// Our record of an intent we created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRecord {
    pub intent_id: String,
    pub camp_id: Uuid,
    /// Authoritative amount charged, minor units
    pub amount: i64,
    pub currency: Currency,
    pub children_count: i32,
    pub selected_items: Vec<SelectedItem>,
    pub state: IntentState,
    pub registration_id: Option<Uuid>,
    pub failure_reason: Option<String>,
    /// Set when the provider confirmed the money moved
    pub payment_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compare-and-set edit of an `IntentRecord`
#[derive(Debug, Clone)]
pub struct IntentTransition {
    pub from: IntentState,
    pub to: IntentState,
    pub registration_id: Option<Uuid>,
    pub failure_reason: Option<String>,
    pub payment_confirmed: Option<bool>,
}

impl IntentTransition {
    pub fn new(from: IntentState, to: IntentState) -> Self {
        Self {
            from,
            to,
            registration_id: None,
            failure_reason: None,
            payment_confirmed: None,
        }
    }

    pub fn with_registration(mut self, id: Uuid) -> Self {
        self.registration_id = Some(id);
        self
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn with_payment_confirmed(mut self, confirmed: bool) -> Self {
        self.payment_confirmed = Some(confirmed);
        self
    }

    /// Apply to a record already known to be in `from`
    pub fn apply(&self, record: &mut IntentRecord) {
        record.state = self.to;
        if let Some(id) = self.registration_id {
            record.registration_id = Some(id);
        }
        if let Some(reason) = &self.failure_reason {
            record.failure_reason = Some(reason.clone());
        }
        if let Some(confirmed) = self.payment_confirmed {
            record.payment_confirmed = confirmed;
        }
        record.updated_at = Utc::now();
    }
}

/// In-process payment processor for development and tests.
///
/// Intents start in `requires_payment_method` unless auto-confirm is on;
/// tests drive them with `set_status`.
#[derive(Debug, Default)]
pub struct MockPaymentProcessor {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    auto_confirm: bool,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every created intent is immediately `succeeded`
    pub fn auto_confirming() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            auto_confirm: true,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Simulate the browser-side confirmation outcome
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) -> PaymentResult<()> {
        let mut intents = self.lock()?;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound {
                intent_id: intent_id.to_string(),
            })?;
        intent.status = status;
        Ok(())
    }

    pub fn intent_count(&self) -> usize {
        self.lock().map(|i| i.len()).unwrap_or(0)
    }

    fn lock(&self) -> PaymentResult<std::sync::MutexGuard<'_, HashMap<String, PaymentIntent>>> {
        self.intents
            .lock()
            .map_err(|_| PaymentError::ProviderError {
                provider: "mock".to_string(),
                message: "intent table poisoned".to_string(),
            })
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<PaymentIntent> {
        if request.amount <= 0 {
            return Err(PaymentError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }
        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
            id: id.clone(),
            amount: request.amount,
            currency: request.currency,
            status: if self.auto_confirm {
                IntentStatus::Succeeded
            } else {
                IntentStatus::RequiresPaymentMethod
            },
            created_at: Utc::now(),
        };
        self.lock()?.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent> {
        self.lock()?
            .get(intent_id)
            .map(|intent| PaymentIntent {
                client_secret: None,
                ..intent.clone()
            })
            .ok_or_else(|| PaymentError::IntentNotFound {
                intent_id: intent_id.to_string(),
            })
    }

    async fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> PaymentResult<PaymentEvent> {
        Err(PaymentError::WebhookVerificationFailed(
            "mock processor does not sign webhooks".to_string(),
        ))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_intent_lifecycle() {
        let mock = MockPaymentProcessor::new();
        let intent = mock
            .create_intent(&IntentRequest::new(25_000, Currency::USD))
            .await
            .unwrap();
        assert!(intent.client_secret.is_some());
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);

        mock.set_status(&intent.id, IntentStatus::Succeeded).unwrap();
        let fetched = mock.retrieve_intent(&intent.id).await.unwrap();
        assert!(fetched.status.is_succeeded());
        assert!(fetched.client_secret.is_none());
    }

    #[tokio::test]
    async fn test_mock_rejects_zero_amount() {
        let mock = MockPaymentProcessor::new();
        let err = mock
            .create_intent(&IntentRequest::new(0, Currency::USD))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[test]
    fn test_intent_status_parse() {
        assert_eq!("succeeded".parse::<IntentStatus>(), Ok(IntentStatus::Succeeded));
        assert!("bogus".parse::<IntentStatus>().is_err());
    }

    #[test]
    fn test_webhook_path() {
        assert_eq!(MockPaymentProcessor::new().webhook_path(), "/webhook/mock");
    }
}
