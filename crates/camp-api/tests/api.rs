//! End-to-end HTTP tests against the in-memory store and mock processor.

use axum::http::StatusCode;
use axum_test::TestServer;
use camp_api::{create_router, AppConfig, AppState};
use camp_core::{
    AdminGateway, BootstrapCredentials, IntentStatus, MemoryStore, MockPaymentProcessor,
    SharedStore,
};
use serde_json::{json, Value};
use std::sync::Arc;

const ADMIN_USER: &str = "director";
const ADMIN_PASS: &str = "campfire-2026";

struct Harness {
    server: TestServer,
    processor: Arc<MockPaymentProcessor>,
}

fn bootstrap() -> BootstrapCredentials {
    BootstrapCredentials {
        username: ADMIN_USER.to_string(),
        password: ADMIN_PASS.to_string(),
    }
}

fn harness() -> Harness {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let processor = MockPaymentProcessor::shared();
    let config = AppConfig {
        admin_token_secret: Some("test-token-secret".to_string()),
        bootstrap: Some(bootstrap()),
        ..AppConfig::default()
    };

    let state = AppState::new(config, store.clone(), processor.clone()).with_admin(
        AdminGateway::new(store)
            .with_bootstrap(bootstrap())
            .with_hash_cost(4),
    );

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        processor,
    }
}

async fn login(server: &TestServer) -> String {
    let response = server
        .post("/api/auth")
        .json(&json!({ "username": ADMIN_USER, "password": ADMIN_PASS }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_camp(server: &TestServer, token: &str, body: Value) -> String {
    let response = server
        .post("/api/camps")
        .authorization_bearer(token)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

fn camp_body(max_spots: i32) -> Value {
    json!({
        "name": "Summer Week 1",
        "startDate": "2026-07-06",
        "endDate": "2026-07-10",
        "ageMin": 6,
        "ageMax": 12,
        "maxSpots": max_spots,
        "waitlistEnabled": true,
        "waitlistMessage": "Email the office to join the waitlist."
    })
}

fn registration(camp_id: &str, children: usize) -> Value {
    let kids: Vec<Value> = (0..children)
        .map(|i| {
            json!({
                "firstName": format!("Kid{}", i),
                "lastName": "Rivera",
                "dateOfBirth": "2017-03-14"
            })
        })
        .collect();
    json!({
        "campId": camp_id,
        "children": kids,
        "guardian": {
            "firstName": "Ana",
            "lastName": "Rivera",
            "email": "ana@example.com",
            "phone": "555-0100"
        },
        "emergencyContact1": { "name": "Luis Rivera", "phone": "555-0101", "relationship": "Uncle" },
        "permissions": {
            "liabilityWaiver": true,
            "medicalTreatment": true,
            "photoRelease": true,
            "codeOfConduct": true
        }
    })
}

#[tokio::test]
async fn health_reports_service() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["service"], "camp-register");
}

#[tokio::test]
async fn free_registration_fills_camp_then_rejects_with_waitlist() {
    let h = harness();
    let token = login(&h.server).await;
    let camp_id = create_camp(&h.server, &token, camp_body(2)).await;

    let response = h
        .server
        .post("/api/submit")
        .json(&registration(&camp_id, 2))
        .await;
    response.assert_status(StatusCode::CREATED);
    let receipt = response.json::<Value>();
    assert_eq!(receipt["spotsLeft"], 0);
    assert_eq!(receipt["total"], 2);
    assert_eq!(receipt["max"], 2);

    let status = h
        .server
        .get(&format!("/api/status?campId={}", camp_id))
        .await
        .json::<Value>();
    assert_eq!(status["isFull"], true);

    let response = h
        .server
        .post("/api/submit")
        .json(&registration(&camp_id, 1))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "full");
    assert_eq!(body["waitlist"], "Email the office to join the waitlist.");

    let listed = h
        .server
        .get("/api/registrations")
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn paid_registration_commits_after_confirmation() {
    let h = harness();
    let token = login(&h.server).await;
    let camp_id = create_camp(&h.server, &token, camp_body(10)).await;

    h.server
        .post("/api/pricing")
        .authorization_bearer(&token)
        .json(&json!({
            "name": "Camp fee",
            "amount": 25000,
            "itemType": "base_fee",
            "isRequired": true
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let quote = h
        .server
        .get(&format!("/api/quote?campId={}&childrenCount=1", camp_id))
        .await
        .json::<Value>();
    assert_eq!(quote["total"], 25000);

    // Without an intent the priced submission is refused
    h.server
        .post("/api/submit")
        .json(&registration(&camp_id, 1))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let intent = h
        .server
        .post("/api/create-payment-intent")
        .json(&json!({ "campId": camp_id, "childrenCount": 1, "amount": 25000, "currency": "usd" }))
        .await;
    intent.assert_status_ok();
    let intent = intent.json::<Value>();
    assert!(intent["clientSecret"].as_str().is_some());
    let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();

    // Unconfirmed payment: nothing is written
    let mut body = registration(&camp_id, 1);
    body["paymentIntentId"] = json!(intent_id);
    body["paymentStatus"] = json!("paid");
    h.server
        .post("/api/submit")
        .json(&body)
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);

    h.processor
        .set_status(&intent_id, IntentStatus::Succeeded)
        .unwrap();

    let response = h.server.post("/api/submit").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    let receipt = response.json::<Value>();
    assert_eq!(receipt["totalAmount"], 25000);
    assert_eq!(receipt["paymentStatus"], "paid");
    assert_eq!(receipt["spotsLeft"], 9);

    // Retrying finalize returns the same registration
    let retry = h.server.post("/api/submit").json(&body).await;
    retry.assert_status(StatusCode::CREATED);
    assert_eq!(retry.json::<Value>()["id"], receipt["id"]);
}

#[tokio::test]
async fn payment_intent_for_full_camp_is_bad_request() {
    let h = harness();
    let token = login(&h.server).await;
    let camp_id = create_camp(&h.server, &token, camp_body(1)).await;

    h.server
        .post("/api/pricing")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Camp fee", "amount": 25000, "itemType": "base_fee", "isRequired": true }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = h
        .server
        .post("/api/create-payment-intent")
        .json(&json!({ "campId": camp_id, "childrenCount": 2 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "full");
    assert_eq!(h.processor.intent_count(), 0);
}

#[tokio::test]
async fn invalid_payload_lists_field_errors() {
    let h = harness();
    let token = login(&h.server).await;
    let camp_id = create_camp(&h.server, &token, camp_body(5)).await;

    let mut body = registration(&camp_id, 2);
    body["children"][1]["hasAllergies"] = json!(true);
    body["permissions"]["photoRelease"] = json!(false);

    let response = h.server.post("/api/submit").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "validation");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert!(fields.contains(&"children[1].allergyDetails"));

    let status = h
        .server
        .get(&format!("/api/status?campId={}", camp_id))
        .await
        .json::<Value>();
    assert_eq!(status["total"], 0);
}

#[tokio::test]
async fn malformed_body_is_validation_error() {
    let h = harness();

    let response = h
        .server
        .post("/api/submit")
        .json(&json!({ "campId": "not-a-uuid", "children": 5 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "validation");
    assert_eq!(body["details"][0]["field"], "body");

    let response = h
        .server
        .post("/api/create-payment-intent")
        .bytes("{\"campId\":".into())
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "validation");
}

#[tokio::test]
async fn status_requires_camp_id() {
    let h = harness();
    h.server
        .get("/api/status")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get(&format!("/api/status?campId={}", uuid::Uuid::new_v4()))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let h = harness();
    h.server
        .get("/api/registrations")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/api/camps?includeArchived=true")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/api/admin-config")
        .authorization_bearer("not-a-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .post("/api/auth")
        .json(&json!({ "username": ADMIN_USER, "password": "wrong-password" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // The public list still works
    h.server.get("/api/camps").await.assert_status_ok();
}

#[tokio::test]
async fn cancel_releases_spots_and_delete_keeps_them() {
    let h = harness();
    let token = login(&h.server).await;
    let camp_id = create_camp(&h.server, &token, camp_body(4)).await;

    let first = h
        .server
        .post("/api/submit")
        .json(&registration(&camp_id, 2))
        .await
        .json::<Value>();
    let second = h
        .server
        .post("/api/submit")
        .json(&registration(&camp_id, 1))
        .await
        .json::<Value>();

    let deleted = h
        .server
        .delete(&format!("/api/registrations/{}", second["id"].as_str().unwrap()))
        .authorization_bearer(&token)
        .await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Value>()["guardian"]["firstName"], "[deleted]");

    let cancelled = h
        .server
        .post(&format!(
            "/api/registrations/{}/cancel",
            first["id"].as_str().unwrap()
        ))
        .authorization_bearer(&token)
        .await;
    cancelled.assert_status_ok();
    assert_eq!(cancelled.json::<Value>()["registrationStatus"], "cancelled");

    let status = h
        .server
        .get(&format!("/api/status?campId={}", camp_id))
        .await
        .json::<Value>();
    assert_eq!(status["total"], 1);
    assert_eq!(status["spotsLeft"], 3);
}

#[tokio::test]
async fn archived_camp_hidden_from_public_list() {
    let h = harness();
    let token = login(&h.server).await;
    let camp_id = create_camp(&h.server, &token, camp_body(4)).await;

    h.server
        .delete(&format!("/api/camps/{}", camp_id))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    let public = h.server.get("/api/camps").await.json::<Value>();
    assert_eq!(public["camps"].as_array().unwrap().len(), 0);

    let all = h
        .server
        .get("/api/camps?includeArchived=true")
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(all["camps"][0]["status"], "archived");

    h.server
        .post(&format!("/api/camps/{}/restore", camp_id))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    let public = h.server.get("/api/camps").await.json::<Value>();
    assert_eq!(public["camps"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_config_changes_default_spots_and_credentials() {
    let h = harness();
    let token = login(&h.server).await;

    let view = h
        .server
        .post("/api/admin-config")
        .authorization_bearer(&token)
        .json(&json!({ "defaultMaxSpots": 12, "username": "owner", "password": "new-password-1" }))
        .await;
    view.assert_status_ok();
    let view = view.json::<Value>();
    assert_eq!(view["defaultMaxSpots"], 12);
    assert_eq!(view["adminUsername"], "owner");
    assert_eq!(view["credentialsConfigured"], true);

    // The stored hash now wins over the bootstrap pair
    h.server
        .post("/api/auth")
        .json(&json!({ "username": ADMIN_USER, "password": ADMIN_PASS }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .post("/api/auth")
        .json(&json!({ "username": "owner", "password": "new-password-1" }))
        .await
        .assert_status_ok();

    let mut body = camp_body(0);
    body.as_object_mut().unwrap().remove("maxSpots");
    let camp_id = create_camp(&h.server, &token, body).await;
    let camp = h
        .server
        .get(&format!("/api/camps/{}", camp_id))
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(camp["maxSpots"], 12);
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let h = harness();
    h.server
        .post("/webhook/stripe")
        .bytes("{}".into())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
