//! # camp-core
//!
//! Core types and services for the camp-register registration engine.
//!
//! This crate provides:
//! - `Camp`, `PricingItem` and `Registration` domain types
//! - `PricingEngine` for the deterministic price calculation
//! - `CapacityLedger` for oversell-free spot reservation
//! - `RegistrationStore` trait plus an in-memory `MemoryStore`
//! - `PaymentProcessor` trait plus a `MockPaymentProcessor`
//! - `PaymentCoordinator`, `RegistrationWorkflow` and `AdminGateway`
//!   (`AdminGateway` and admin settings need the default `server` feature)
//! - `CampError` and friends for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use camp_core::{MemoryStore, MockPaymentProcessor, RegistrationWorkflow, Currency};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let workflow = RegistrationWorkflow::new(store, MockPaymentProcessor::shared(), Currency::USD);
//!
//! // Availability for the registration form
//! let status = workflow.get_status(camp_id).await?;
//!
//! // Paid path: price + intent, then finalize once the browser confirms
//! let intent = workflow.create_payment_intent(&request).await?;
//! let receipt = workflow.submit(payload_with_intent_id).await?;
//! ```

#[cfg(feature = "server")]
pub mod admin;
pub mod camp;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod money;
pub mod payment;
pub mod pricing;
pub mod registration;
#[cfg(feature = "server")]
pub mod settings;
pub mod store;
pub mod workflow;

// Re-exports for convenience
#[cfg(feature = "server")]
pub use admin::AdminGateway;
pub use camp::{
    Camp, CampAvailability, CampDraft, CampPatch, CampStatus, DiscountType, RegistrationWindow,
    SiblingDiscount,
};
pub use coordinator::{CreateIntentRequest, CreatedIntent, Finalized, PaymentCoordinator, Quote};
pub use error::{
    CampError, CampResult, CapacityError, FieldError, PaymentError, PaymentResult,
    ValidationError,
};
pub use ledger::CapacityLedger;
pub use money::{format_minor_units, Currency, Money};
pub use payment::{
    BoxedPaymentProcessor, IntentRecord, IntentRequest, IntentState, IntentStatus,
    IntentTransition, MockPaymentProcessor, PaymentEvent, PaymentEventType, PaymentIntent,
    PaymentProcessor,
};
pub use pricing::{
    PriceBreakdown, PricingEngine, PricingItem, PricingItemDraft, PricingItemPatch,
    PricingItemType, SelectedItem,
};
pub use registration::{
    ChildInfo, EmergencyContact, Guardian, PaymentStatus, Permissions, Registration,
    RegistrationFilter, RegistrationPatch, RegistrationPayload, RegistrationReceipt,
    RegistrationStatus, Settlement,
};
#[cfg(feature = "server")]
pub use settings::{AdminConfigUpdate, AdminConfigView, AdminSettings, BootstrapCredentials};
pub use store::{MemoryStore, RegistrationStore, ReservationOutcome, SharedStore};
pub use workflow::RegistrationWorkflow;
