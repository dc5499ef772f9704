//! # Routes
//!
//! Axum router configuration for the registration API.

use crate::admin;
use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - GET  /api/status?campId= - Remaining capacity
///   - GET  /api/camps - Camp list (`includeArchived` needs a token)
///   - GET  /api/pricing - Pricing list (`includeArchived` needs a token)
///   - GET  /api/quote - Server-side price
///   - POST /api/create-payment-intent - Open a payment intent
///   - POST /api/submit - Commit a registration
///   - POST /api/auth - Admin login
///
/// - Admin (`Authorization: Bearer <token>`):
///   - POST /api/camps, GET/PUT/DELETE /api/camps/{id}, POST /api/camps/{id}/restore
///   - POST /api/pricing, GET/PUT/DELETE /api/pricing/{id}
///   - GET  /api/registrations, GET /api/registrations/conflicts
///   - GET/PUT/DELETE /api/registrations/{id}, POST /api/registrations/{id}/cancel
///   - GET/POST /api/admin-config
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let camp_routes = Router::new()
        .route("/", get(handlers::list_camps).post(admin::create_camp))
        .route(
            "/{id}",
            get(admin::get_camp)
                .put(admin::update_camp)
                .delete(admin::archive_camp),
        )
        .route("/{id}/restore", post(admin::restore_camp));

    let pricing_routes = Router::new()
        .route("/", get(handlers::list_pricing).post(admin::create_pricing_item))
        .route(
            "/{id}",
            get(admin::get_pricing_item)
                .put(admin::update_pricing_item)
                .delete(admin::archive_pricing_item),
        );

    let registration_routes = Router::new()
        .route("/", get(admin::list_registrations))
        .route("/conflicts", get(admin::list_conflicts))
        .route(
            "/{id}",
            get(admin::get_registration)
                .put(admin::update_registration)
                .delete(admin::delete_registration),
        )
        .route("/{id}/cancel", post(admin::cancel_registration));

    let api_routes = Router::new()
        .route("/status", get(handlers::status))
        .route("/quote", get(handlers::quote))
        .route("/create-payment-intent", post(handlers::create_payment_intent))
        .route("/submit", post(handlers::submit))
        .route("/auth", post(handlers::auth))
        .route(
            "/admin-config",
            get(admin::get_admin_config).post(admin::update_admin_config),
        )
        .nest("/camps", camp_routes)
        .nest("/pricing", pricing_routes)
        .nest("/registrations", registration_routes);

    // Webhook routes (must accept raw body)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use camp_core::{MemoryStore, MockPaymentProcessor, SharedStore};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let state = AppState::new(
            crate::state::AppConfig::default(),
            store,
            MockPaymentProcessor::shared(),
        );
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
