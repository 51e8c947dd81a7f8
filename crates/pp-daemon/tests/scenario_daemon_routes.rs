//! In-process scenario tests for pp-daemon HTTP endpoints.
//!
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no TCP socket is bound.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pp_daemon::{routes, state};
use pp_db::MemoryStore;
use pp_lifecycle::{DispatchMode, OrderLifecycle};
use pp_testkit::RecordingNotifier;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestApp {
    state: Arc<state::AppState>,
    notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let lifecycle = OrderLifecycle::new(store.clone(), notifier.clone(), store)
            .with_mode(DispatchMode::Inline);
        Self {
            state: Arc::new(state::AppState::new(Arc::new(lifecycle))),
            notifier,
        }
    }

    fn router(&self) -> axum::Router {
        routes::build_router(Arc::clone(&self.state))
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router().oneshot(req).await.expect("oneshot failed");
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .expect("body collect failed")
            .to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("body is not valid JSON")
        };
        (status, json)
    }

    async fn create(&self, status: &str) -> Uuid {
        let (code, body) = self
            .call(as_admin(post_json("/v1/orders", json!({ "status": status }))))
            .await;
        assert_eq!(code, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

fn with_actor(mut req: Request<Body>, role: &str) -> Request<Body> {
    let h = req.headers_mut();
    h.insert(routes::HDR_ACTOR_ID, Uuid::new_v4().to_string().parse().unwrap());
    h.insert(routes::HDR_ACTOR_NAME, "Route Test".parse().unwrap());
    h.insert(routes::HDR_ACTOR_ROLE, role.parse().unwrap());
    req
}

fn as_admin(req: Request<Body>) -> Request<Body> {
    with_actor(req, "admin")
}

fn as_client(req: Request<Body>) -> Request<Body> {
    with_actor(req, "client")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let app = TestApp::new();
    let (status, json) = app.call(get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "pp-daemon");
    assert_eq!(json["dispatch_mode"], "inline");
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incomplete_transition_is_422_with_missing_fields() {
    let app = TestApp::new();
    let id = app.create("Open").await;

    let (status, json) = app
        .call(as_admin(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({ "target": "Ready" }),
        )))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "VALIDATION_FAILED");
    assert_eq!(
        json["missing_fields"],
        json!(["so_number", "invoice_number", "number_of_pallets"])
    );
}

#[tokio::test]
async fn transition_to_ready_creates_packing_slip() {
    let app = TestApp::new();
    let id = app.create("Open").await;

    let (status, json) = app
        .call(as_admin(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({
                "target": "Ready",
                "fields": { "so_number": "SO-100", "invoice_number": "INV-5", "number_of_pallets": "2" },
                "notification_message": "Pickup at dock 4"
            }),
        )))
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["status"], "Ready");
    assert_eq!(json["number_of_pallets"], 2);

    let (_, order) = app.call(get(&format!("/v1/orders/{id}"))).await;
    assert_eq!(order["packing_slip_generated"], true);
    assert_eq!(app.notifier.kinds(), vec!["ready"]);

    // Manual request after the automatic one does not create a second slip.
    let (status, json) = app
        .call(as_admin(post_json(&format!("/v1/orders/{id}/packing-slip"), json!({}))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["created"], false);

    let (_, hist) = app.call(get(&format!("/v1/orders/{id}/history"))).await;
    let kinds: Vec<&str> = hist["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["order_created", "status_change", "packing_slip_created"]);
}

#[tokio::test]
async fn client_edit_lock_is_403_and_terminal_is_409() {
    let app = TestApp::new();
    let id = app.create("Open").await;

    let (status, _) = app
        .call(as_client(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({ "target": "In Process", "fields": { "so_number": "SO-1" } }),
        )))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app
        .call(as_client(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({ "target": "Cancelled" }),
        )))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "EDIT_LOCKED");

    let (status, _) = app
        .call(as_admin(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({ "target": "Cancelled" }),
        )))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app
        .call(as_admin(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({ "target": "Open" }),
        )))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "TERMINAL_STATUS");
}

#[tokio::test]
async fn missing_actor_headers_is_400() {
    let app = TestApp::new();
    let id = app.create("Open").await;

    let (status, json) = app
        .call(post_json(
            &format!("/v1/orders/{id}/transition"),
            json!({ "target": "Cancelled" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "ACTOR_REQUIRED");
}

// ---------------------------------------------------------------------------
// Queries / deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn permissions_reflect_role() {
    let app = TestApp::new();
    let id = app.create("Draft").await;

    let (status, json) = app
        .call(get(&format!("/v1/orders/{id}/permissions?role=client")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["can_delete"], true);
    assert_eq!(json["edit_locked"], true);
    assert_eq!(json["packing_slip"], "locked");
    assert_eq!(json["allowed_targets"], json!([]));

    let (status, _) = app
        .call(get(&format!("/v1/orders/{id}/permissions?role=owner")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_rules_and_unknown_order() {
    let app = TestApp::new();
    let open = app.create("Open").await;
    let draft = app.create("Draft").await;

    let (status, json) = app.call(as_admin(delete(&format!("/v1/orders/{open}")))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "DELETION_NOT_ALLOWED");

    let (status, json) = app.call(as_client(delete(&format!("/v1/orders/{draft}")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], true);

    let (status, _) = app.call(get(&format!("/v1/orders/{draft}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // History is kept after deletion.
    let (status, hist) = app.call(get(&format!("/v1/orders/{draft}/history"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hist["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_rejects_non_initial_status() {
    let app = TestApp::new();
    let (status, json) = app
        .call(as_admin(post_json("/v1/orders", json!({ "status": "Done" }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_INITIAL_STATUS");
}

#[tokio::test]
async fn transition_publishes_order_event_on_bus() {
    let app = TestApp::new();
    let mut rx = app.state.bus.subscribe();
    let id = app.create("Open").await;

    let evt = rx.recv().await.unwrap();
    match evt {
        state::BusMsg::Order(e) => {
            assert_eq!(e.order_id, id);
            assert_eq!(e.action, "created");
        }
        other => panic!("expected order event, got {other:?}"),
    }
}
