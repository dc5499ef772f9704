//! # camp-stripe
//!
//! Stripe PaymentIntents processor for camp-register-rs.
//!
//! The browser confirms the payment with Stripe.js; this crate creates
//! intents for the server-side price and reads their status back when the
//! registration is finalized.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use camp_stripe::StripeIntentProcessor;
//! use camp_core::{Currency, IntentRequest, PaymentProcessor};
//!
//! let processor = StripeIntentProcessor::from_env()?;
//!
//! let intent = processor
//!     .create_intent(&IntentRequest::new(48_000, Currency::USD))
//!     .await?;
//! // Hand intent.client_secret to the browser
//!
//! // Later, before committing the registration:
//! let current = processor.retrieve_intent(&intent.id).await?;
//! assert!(current.status.is_succeeded());
//! ```
//!
//! ## Webhooks
//!
//! ```rust,ignore
//! let event = processor.verify_webhook(body, stripe_signature_header).await?;
//! coordinator.reconcile(&event).await?;
//! ```

pub mod config;
pub mod intents;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use intents::StripeIntentProcessor;
pub use webhook::{
    parse_event, sign_payload, verify_signature, REQUIRED_WEBHOOK_EVENTS,
    SIGNATURE_TOLERANCE_SECS,
};
