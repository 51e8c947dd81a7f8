//! Request and response types for the pp-daemon HTTP endpoints.
//!
//! No business logic lives here.

use pp_audit::HistoryEntry;
use pp_schemas::{OrderField, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    /// "inline" | "background"
    pub dispatch_mode: &'static str,
    pub effects_in_flight: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable code, e.g. "VALIDATION_FAILED".
    pub error: String,
    pub message: String,
    /// Only for validation failures, in reporting order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<OrderField>,
}

// ---------------------------------------------------------------------------
// /v1/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub order_id: Uuid,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsQuery {
    /// "admin" | "client"
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingSlipResponse {
    pub order_id: Uuid,
    /// false when the order already had a packing slip.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub order_id: Uuid,
    pub deleted: bool,
}
