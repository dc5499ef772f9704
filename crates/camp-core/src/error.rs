//! # Error Types
//!
//! Typed error handling for camp registration.
//! Provider-level failures are `PaymentError`; everything a request can
//! fail with is folded into `CampError`.

use serde::Serialize;
use thiserror::Error;

/// Errors raised by a payment processor or while talking to one
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Intent unknown to the provider or to us
    #[error("Payment intent not found: {intent_id}")]
    IntentNotFound { intent_id: String },

    /// Intent exists but the provider does not report it as succeeded
    #[error("Payment not confirmed for intent {intent_id} (status: {status})")]
    NotConfirmed { intent_id: String, status: String },

    /// Client-supplied amount disagrees with the server-side price
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: i64, actual: i64 },

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::NetworkError(_) | PaymentError::ProviderError { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::ProviderError { .. } => 502,
            PaymentError::NetworkError(_) => 503,
            PaymentError::IntentNotFound { .. } => 404,
            PaymentError::NotConfirmed { .. } => 402,
            PaymentError::AmountMismatch { .. } => 400,
            PaymentError::WebhookVerificationFailed(_) => 401,
            PaymentError::WebhookParseError(_) => 400,
            PaymentError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Why a capacity reservation was refused
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityError {
    #[error("Camp is full")]
    CampFull,
    #[error("Camp not found")]
    CampNotFound,
    #[error("Registration is not open for this camp")]
    RegistrationClosed,
    #[error("Camp is archived")]
    CampArchived,
}

impl CapacityError {
    /// Stable machine code used in HTTP bodies
    pub fn code(&self) -> &'static str {
        match self {
            CapacityError::CampFull => "full",
            CapacityError::CampNotFound => "camp_not_found",
            CapacityError::RegistrationClosed => "registration_closed",
            CapacityError::CampArchived => "camp_archived",
        }
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Malformed or incomplete input, with per-field detail
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub details: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }

    /// Single-field shorthand
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field_error = FieldError::new(field, message);
        Self {
            message: field_error.message.clone(),
            details: vec![field_error],
        }
    }
}

/// Top-level error for every registration, payment and admin operation
#[derive(Debug, Error)]
pub enum CampError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Payment went through but the spot could not be honoured.
    /// Needs an operator: refund or move to the waitlist.
    #[error("Payment {intent_id} succeeded but no spot could be reserved: {reason}")]
    PostPaymentCapacityConflict {
        intent_id: String,
        reason: CapacityError,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Request collides with in-flight or committed state
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CampError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CampError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        CampError::Storage(err.to_string())
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CampError::Payment(e) => e.is_retryable(),
            CampError::Storage(_) => true,
            _ => false,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CampError::Validation(_) => 400,
            CampError::Capacity(CapacityError::CampNotFound) => 404,
            CampError::Capacity(_) => 409,
            CampError::Payment(e) => e.status_code(),
            CampError::PostPaymentCapacityConflict { .. } => 409,
            CampError::Auth(_) => 401,
            CampError::NotFound { .. } => 404,
            CampError::Conflict(_) => 409,
            CampError::Storage(_) => 500,
            CampError::Configuration(_) => 500,
        }
    }

    /// Stable machine code for the `error` field of HTTP bodies
    pub fn code(&self) -> &'static str {
        match self {
            CampError::Validation(_) => "validation",
            CampError::Capacity(e) => e.code(),
            CampError::Payment(PaymentError::NotConfirmed { .. }) => "payment_not_confirmed",
            CampError::Payment(PaymentError::AmountMismatch { .. }) => "amount_mismatch",
            CampError::Payment(_) => "payment",
            CampError::PostPaymentCapacityConflict { .. } => "post_payment_capacity_conflict",
            CampError::Auth(_) => "unauthorized",
            CampError::NotFound { .. } => "not_found",
            CampError::Conflict(_) => "conflict",
            CampError::Storage(_) => "storage",
            CampError::Configuration(_) => "configuration",
        }
    }
}

/// Result type alias for camp operations
pub type CampResult<T> = Result<T, CampError>;
