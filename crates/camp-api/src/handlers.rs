//! # Request Handlers
//!
//! Public endpoints: availability, catalog, quote, payment intents,
//! submission, admin login and the payment webhook.

use crate::auth::{AdminSession, IssuedToken};
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use camp_core::{
    CampAvailability, CampError, CapacityError, CreateIntentRequest, CreatedIntent, PaymentError,
    Quote, RegistrationPayload, RegistrationReceipt,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    #[serde(default)]
    pub camp_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub camp_id: Uuid,
    #[serde(default = "default_children")]
    pub children_count: i32,
    /// Comma-separated pricing item ids
    #[serde(default)]
    pub items: Option<String>,
}

fn default_children() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{} is not a valid id: {}", field, value)))
}

/// Archived rows are only listed for an authenticated admin
fn check_archived_access(
    query: &ListQuery,
    headers: &HeaderMap,
    state: &AppState,
) -> Result<(), ApiError> {
    if query.include_archived {
        AdminSession::from_headers(headers, state)?;
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "camp-register",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Remaining capacity; never writes
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<CampAvailability>, ApiError> {
    let camp_id = query
        .camp_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("campId is required"))?;
    let camp_id = parse_uuid("campId", camp_id)?;

    Ok(Json(state.workflow.get_status(camp_id).await?))
}

pub async fn list_camps(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    check_archived_access(&query, &headers, &state)?;
    let camps = state.workflow.list_camps(query.include_archived).await?;
    Ok(Json(serde_json::json!({ "camps": camps })))
}

pub async fn list_pricing(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    check_archived_access(&query, &headers, &state)?;
    let items = state.workflow.list_pricing(query.include_archived).await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

/// Server-side price for the registration form
pub async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Quote>, ApiError> {
    let selected = query
        .items
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|id| !id.trim().is_empty())
        .map(|id| parse_uuid("items", id))
        .collect::<Result<Vec<_>, _>>()?;

    let quote = state
        .workflow
        .quote(query.camp_id, query.children_count, &selected)
        .await?;
    Ok(Json(quote))
}

/// Recompute the price and open a payment intent for it
#[instrument(skip(state, request), fields(camp_id = %request.camp_id, children = request.children_count))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateIntentRequest>,
) -> Result<Json<CreatedIntent>, ApiError> {
    state
        .workflow
        .create_payment_intent(&request)
        .await
        .map(Json)
        .map_err(|e| {
            let bad_request = matches!(
                e,
                CampError::Validation(_)
                    | CampError::Capacity(_)
                    | CampError::Payment(PaymentError::AmountMismatch { .. })
            );
            let err = ApiError::from(e);
            if bad_request {
                err.with_status(StatusCode::BAD_REQUEST)
            } else {
                err
            }
        })
}

/// Commit a registration (free, or finalizing a confirmed payment)
#[instrument(skip(state, payload), fields(camp_id = %payload.camp_id, children = payload.children.len()))]
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegistrationPayload>,
) -> Result<(StatusCode, Json<RegistrationReceipt>), ApiError> {
    let camp_id = payload.camp_id;
    match state.workflow.submit(payload).await {
        Ok(receipt) => {
            info!(registration_id = %receipt.id, spots_left = receipt.spots_left, "Registration submitted");
            Ok((StatusCode::CREATED, Json(receipt)))
        }
        Err(e @ CampError::Capacity(CapacityError::CampFull)) => {
            let hint = state.workflow.waitlist_hint(camp_id).await;
            Err(ApiError::from(e).with_waitlist(hint))
        }
        Err(e) => Err(e.into()),
    }
}

/// Exchange admin credentials for a bearer token
pub async fn auth(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AuthRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let username = state
        .admin
        .authenticate(&request.username, &request.password)
        .await?;
    let issued = state.tokens.issue(&username, Utc::now())?;
    info!(username = %username, "Admin signed in");
    Ok(Json(issued))
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    let coordinator = state.workflow.coordinator();
    let event = coordinator
        .processor()
        .verify_webhook(&body, signature)
        .await
        .map_err(|e| {
            warn!(error = %e, "Webhook verification failed");
            ApiError::from(CampError::from(e))
        })?;

    info!(
        event_type = ?event.event_type,
        event_id = %event.event_id,
        intent_id = event.intent_id.as_deref().unwrap_or(""),
        "Received webhook"
    );
    coordinator.reconcile(&event).await?;

    Ok(Json(serde_json::json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("campId", &id.to_string()).unwrap(), id);
        assert_eq!(parse_uuid("campId", &format!(" {} ", id)).unwrap(), id);

        let err = parse_uuid("campId", "camp-1").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.include_archived);
    }
}
