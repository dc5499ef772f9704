//! # Stripe PaymentIntents
//!
//! `PaymentProcessor` backed by the Stripe PaymentIntents API. The browser
//! confirms the intent with Stripe.js using the client secret; the server
//! only creates intents and reads their status back.

use crate::config::StripeConfig;
use crate::webhook;
use async_trait::async_trait;
use camp_core::{
    Currency, IntentRequest, IntentStatus, PaymentError, PaymentEvent, PaymentIntent,
    PaymentProcessor, PaymentResult,
};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe PaymentIntents processor
pub struct StripeIntentProcessor {
    config: StripeConfig,
    client: Client,
}

impl StripeIntentProcessor {
    /// Create a new processor
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn form_params(request: &IntentRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.as_str().to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if !request.description.is_empty() {
            params.push(("description".to_string(), request.description.clone()));
        }
        let mut metadata: Vec<_> = request.metadata.iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }
        params
    }

    async fn read_intent(response: Response) -> PaymentResult<PaymentIntent> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                if error_response.error.code.as_deref() == Some("resource_missing") {
                    return Err(PaymentError::IntentNotFound {
                        intent_id: error_response.error.param.unwrap_or_default(),
                    });
                }
                return Err(PaymentError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: error_response.error.message,
                });
            }

            return Err(PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let intent: StripePaymentIntent = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;
        intent.into_intent()
    }
}

#[async_trait]
impl PaymentProcessor for StripeIntentProcessor {
    #[instrument(skip(self, request), fields(amount = request.amount, currency = request.currency.as_str()))]
    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<PaymentIntent> {
        if request.amount <= 0 {
            return Err(PaymentError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }

        let url = format!("{}/v1/payment_intents", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&Self::form_params(request))
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let intent = Self::read_intent(response).await?;
        info!(intent_id = %intent.id, status = intent.status.as_str(), "Created Stripe payment intent");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent> {
        if intent_id.is_empty() || intent_id.contains('/') {
            return Err(PaymentError::InvalidRequest(format!(
                "Malformed payment intent id: {}",
                intent_id
            )));
        }

        let url = format!("{}/v1/payment_intents/{}", self.config.api_base_url, intent_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let intent = Self::read_intent(response).await.map_err(|e| match e {
            PaymentError::IntentNotFound { .. } => PaymentError::IntentNotFound {
                intent_id: intent_id.to_string(),
            },
            other => other,
        })?;
        debug!(status = intent.status.as_str(), "Retrieved Stripe payment intent");

        // The client secret is only handed out at creation.
        Ok(PaymentIntent {
            client_secret: None,
            ..intent
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<PaymentEvent> {
        webhook::verify_signature(&self.config.webhook_secret, payload, signature, Utc::now())?;
        webhook::parse_event(payload)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
    created: i64,
}

impl StripePaymentIntent {
    fn into_intent(self) -> PaymentResult<PaymentIntent> {
        let currency: Currency = self
            .currency
            .parse()
            .map_err(PaymentError::Serialization)?;
        let status: IntentStatus = self.status.parse()?;
        Ok(PaymentIntent {
            id: self.id,
            client_secret: self.client_secret,
            amount: self.amount,
            currency,
            status,
            created_at: DateTime::from_timestamp(self.created, 0).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    param: Option<String>,
}
