//! Shared runtime state for pp-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The lifecycle owns all
//! order state; this module only adds the SSE bus and build metadata.

use std::sync::Arc;
use std::time::Duration;

use pp_lifecycle::{EffectFailure, EffectReport, OrderLifecycle};
use pp_schemas::{NotificationKind, OrderStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Order(OrderEvent),
    Effects(EffectSummary),
    LogLine { level: String, msg: String },
}

/// A committed change to one order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    /// "created" | "transition" | "packing_slip" | "deleted"
    pub action: String,
    pub status: Option<OrderStatus>,
    pub actor: String,
}

/// What the side effects of one transition did.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectSummary {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub notification: Option<NotificationKind>,
    pub packing_slip_created: bool,
    pub netsuite_ready: bool,
    pub failures: Vec<EffectFailure>,
}

impl From<EffectReport> for EffectSummary {
    fn from(r: EffectReport) -> Self {
        Self {
            order_id: r.order.id,
            from: r.from,
            to: r.to,
            notification: r.notification,
            packing_slip_created: r.packing_slip_created,
            netsuite_ready: r.netsuite_ready,
            failures: r.failures,
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub lifecycle: Arc<OrderLifecycle>,
}

impl AppState {
    pub fn new(lifecycle: Arc<OrderLifecycle>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "pp-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            lifecycle,
        }
    }

    pub fn publish(&self, msg: BusMsg) {
        // No subscribers is not an error.
        let _ = self.bus.send(msg);
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Forward every side-effect report from the lifecycle onto the SSE bus.
pub fn spawn_effect_forwarder(state: Arc<AppState>) {
    let mut rx = state.lifecycle.subscribe_effects();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(report) => {
                    for f in &report.failures {
                        state.publish(BusMsg::LogLine {
                            level: "WARN".to_string(),
                            msg: format!("order {} {:?} effect failed: {}", report.order.id, f.kind, f.message),
                        });
                    }
                    state.publish(BusMsg::Effects(report.into()));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "effect forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
