//! # Admin Handlers
//!
//! Every handler here takes an `AdminSession`, so requests without a valid
//! bearer token are rejected with 401 before any work happens.

use crate::auth::AdminSession;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use camp_core::{
    AdminConfigUpdate, AdminConfigView, Camp, CampDraft, CampPatch, IntentRecord, PricingItem,
    PricingItemDraft, PricingItemPatch, Registration, RegistrationFilter, RegistrationPatch,
};
use tracing::info;
use uuid::Uuid;

// ----- camps -----------------------------------------------------------------

pub async fn get_camp(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Camp>, ApiError> {
    Ok(Json(state.admin.get_camp(id).await?))
}

pub async fn create_camp(
    admin: AdminSession,
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<CampDraft>,
) -> Result<(StatusCode, Json<Camp>), ApiError> {
    let camp = state.admin.create_camp(draft).await?;
    info!(admin = %admin.username, camp_id = %camp.id, "Camp created");
    Ok((StatusCode::CREATED, Json(camp)))
}

pub async fn update_camp(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<CampPatch>,
) -> Result<Json<Camp>, ApiError> {
    let camp = state.admin.update_camp(id, patch).await?;
    info!(admin = %admin.username, camp_id = %id, "Camp updated");
    Ok(Json(camp))
}

/// Soft delete
pub async fn archive_camp(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Camp>, ApiError> {
    let camp = state.admin.archive_camp(id).await?;
    info!(admin = %admin.username, camp_id = %id, "Camp archived");
    Ok(Json(camp))
}

pub async fn restore_camp(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Camp>, ApiError> {
    let camp = state.admin.restore_camp(id).await?;
    info!(admin = %admin.username, camp_id = %id, "Camp restored");
    Ok(Json(camp))
}

// ----- pricing ---------------------------------------------------------------

pub async fn get_pricing_item(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PricingItem>, ApiError> {
    Ok(Json(state.admin.get_pricing_item(id).await?))
}

pub async fn create_pricing_item(
    admin: AdminSession,
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<PricingItemDraft>,
) -> Result<(StatusCode, Json<PricingItem>), ApiError> {
    let item = state.admin.create_pricing_item(draft).await?;
    info!(admin = %admin.username, item_id = %item.id, "Pricing item created");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_pricing_item(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<PricingItemPatch>,
) -> Result<Json<PricingItem>, ApiError> {
    Ok(Json(state.admin.update_pricing_item(id, patch).await?))
}

pub async fn archive_pricing_item(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PricingItem>, ApiError> {
    Ok(Json(state.admin.archive_pricing_item(id).await?))
}

// ----- registrations ---------------------------------------------------------

pub async fn list_registrations(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(filter): Query<RegistrationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let registrations = state.admin.list_registrations(&filter).await?;
    Ok(Json(serde_json::json!({
        "registrations": registrations,
        "count": registrations.len()
    })))
}

pub async fn get_registration(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    Ok(Json(state.admin.get_registration(id).await?))
}

pub async fn update_registration(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<RegistrationPatch>,
) -> Result<Json<Registration>, ApiError> {
    let registration = state.admin.update_registration(id, patch).await?;
    info!(
        admin = %admin.username,
        registration_id = %id,
        status = registration.registration_status.as_str(),
        "Registration edited"
    );
    Ok(Json(registration))
}

/// Gives the registration's spots back
pub async fn cancel_registration(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let registration = state.admin.cancel_registration(id).await?;
    info!(admin = %admin.username, registration_id = %id, "Registration cancelled");
    Ok(Json(registration))
}

/// Privacy deletion; the capacity effect stays
pub async fn delete_registration(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let registration = state.admin.delete_registration(id).await?;
    info!(admin = %admin.username, registration_id = %id, "Registration deleted");
    Ok(Json(registration))
}

/// Paid intents that could not be honoured
pub async fn list_conflicts(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<IntentRecord>>, ApiError> {
    Ok(Json(state.admin.list_conflicts().await?))
}

// ----- admin config ----------------------------------------------------------

pub async fn get_admin_config(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<AdminConfigView>, ApiError> {
    Ok(Json(state.admin.admin_config().await?))
}

pub async fn update_admin_config(
    admin: AdminSession,
    State(state): State<AppState>,
    ApiJson(update): ApiJson<AdminConfigUpdate>,
) -> Result<Json<AdminConfigView>, ApiError> {
    let view = state.admin.update_admin_config(&update).await?;
    info!(admin = %admin.username, "Admin config updated");
    Ok(Json(view))
}
