//! Axum router and all HTTP handlers for pp-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.
//!
//! Caller identity arrives in `x-actor-id`, `x-actor-name` and `x-actor-role`
//! headers set by the portal front end; authenticating them is not this
//! service's job.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use pp_lifecycle::{LifecycleError, OrderPermissions};
use pp_schemas::{Actor, ActorRole, TransitionRequest};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    api_types::{
        CreateOrderRequest, DeleteResponse, ErrorResponse, HealthResponse, HistoryResponse,
        PackingSlipResponse, PermissionsQuery,
    },
    state::{AppState, BusMsg, OrderEvent},
};

pub const HDR_ACTOR_ID: &str = "x-actor-id";
pub const HDR_ACTOR_NAME: &str = "x-actor-name";
pub const HDR_ACTOR_ROLE: &str = "x-actor-role";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/:id", get(get_order).delete(delete_order))
        .route("/v1/orders/:id/history", get(order_history))
        .route("/v1/orders/:id/permissions", get(order_permissions))
        .route("/v1/orders/:id/transition", post(transition))
        .route("/v1/orders/:id/packing-slip", post(packing_slip))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message,
            missing_fields: Vec::new(),
        }),
    )
        .into_response()
}

fn lifecycle_error(err: LifecycleError) -> Response {
    let status = match &err {
        LifecycleError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::DeletionNotAllowed { .. } | LifecycleError::EditLocked { .. } => {
            StatusCode::FORBIDDEN
        }
        LifecycleError::TerminalStatus { .. } | LifecycleError::PackingSlipLocked { .. } => {
            StatusCode::CONFLICT
        }
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::InvalidInitialStatus { .. } => StatusCode::BAD_REQUEST,
        LifecycleError::PackingSlipFailed(_) | LifecycleError::Persistence(_) => {
            error!(error = %err, "order request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let missing_fields = match &err {
        LifecycleError::Validation { missing_fields } => missing_fields.clone(),
        _ => Vec::new(),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
            missing_fields,
        }),
    )
        .into_response()
}

/// Read the caller from the actor headers. Missing or malformed headers are a
/// 400 with `ACTOR_REQUIRED`.
#[allow(clippy::result_large_err)]
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let parsed = (|| {
        let id = Uuid::parse_str(get(HDR_ACTOR_ID)?).ok()?;
        let role = ActorRole::parse(get(HDR_ACTOR_ROLE)?).ok()?;
        let name = get(HDR_ACTOR_NAME).unwrap_or("unknown");
        Some(Actor::new(id, name, role))
    })();

    parsed.ok_or_else(|| {
        error_body(
            StatusCode::BAD_REQUEST,
            "ACTOR_REQUIRED",
            format!("headers {HDR_ACTOR_ID} (uuid) and {HDR_ACTOR_ROLE} (admin|client) are required"),
        )
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            dispatch_mode: st.lifecycle.mode().as_str(),
            effects_in_flight: st.lifecycle.effects_in_flight(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderRequest>,
) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match st.lifecycle.create_order(body.status, &actor).await {
        Ok(order) => {
            st.publish(BusMsg::Order(OrderEvent {
                order_id: order.id,
                action: "created".to_string(),
                status: Some(order.status),
                actor: actor.name.clone(),
            }));
            (StatusCode::CREATED, Json(order)).into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_order(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.lifecycle.load(id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id/history
// ---------------------------------------------------------------------------

pub(crate) async fn order_history(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.lifecycle.history(id).await {
        Ok(trail) => (
            StatusCode::OK,
            Json(HistoryResponse {
                order_id: id,
                entries: trail.entries().to_vec(),
            }),
        )
            .into_response(),
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id/permissions?role=
// ---------------------------------------------------------------------------

pub(crate) async fn order_permissions(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<PermissionsQuery>,
) -> Response {
    let role = match ActorRole::parse(&q.role) {
        Ok(r) => r,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, "INVALID_ROLE", e.to_string()),
    };
    match st.lifecycle.load(id).await {
        Ok(order) => (StatusCode::OK, Json(OrderPermissions::for_order(&order, role))).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/transition
// ---------------------------------------------------------------------------

pub(crate) async fn transition(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<TransitionRequest>,
) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match st.lifecycle.request_transition(id, req, &actor).await {
        Ok(order) => {
            info!(order_id = %id, status = %order.status, "transition/ok");
            st.publish(BusMsg::Order(OrderEvent {
                order_id: id,
                action: "transition".to_string(),
                status: Some(order.status),
                actor: actor.name.clone(),
            }));
            (StatusCode::OK, Json(order)).into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/packing-slip
// ---------------------------------------------------------------------------

pub(crate) async fn packing_slip(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match st.lifecycle.create_packing_slip(id, &actor).await {
        Ok(created) => {
            if created {
                st.publish(BusMsg::Order(OrderEvent {
                    order_id: id,
                    action: "packing_slip".to_string(),
                    status: None,
                    actor: actor.name.clone(),
                }));
            }
            (
                StatusCode::OK,
                Json(PackingSlipResponse {
                    order_id: id,
                    created,
                }),
            )
                .into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// DELETE /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn delete_order(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match st.lifecycle.delete_order(id, &actor).await {
        Ok(()) => {
            st.publish(BusMsg::Order(OrderEvent {
                order_id: id,
                action: "deleted".to_string(),
                status: None,
                actor: actor.name.clone(),
            }));
            (
                StatusCode::OK,
                Json(DeleteResponse {
                    order_id: id,
                    deleted: true,
                }),
            )
                .into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Order(_) => "order",
                    BusMsg::Effects(_) => "effects",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
