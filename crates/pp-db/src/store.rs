use anyhow::Result;
use chrono::{DateTime, Utc};
use pp_audit::HistoryEntry;
use pp_schemas::Order;
use uuid::Uuid;

/// Storage contract for the order lifecycle.
///
/// # Contract
/// - `commit` is atomic: the order row and every entry land together or not
///   at all. The lifecycle relies on this so a failed write never leaves a
///   partial audit trail.
/// - `save_order` must never clear `packing_slip_generated` once stored.
/// - History is append-only; `delete_order` removes the order row only.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn load_order(&self, id: Uuid) -> Result<Option<Order>>;

    /// Insert a new order with its `order_created` entry (order-creation flow).
    async fn insert_order(&self, order: &Order, created: &HistoryEntry) -> Result<()>;

    async fn save_order(&self, order: &Order) -> Result<()>;

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// Persist `order` and append `entries` as one unit.
    async fn commit(&self, order: &Order, entries: &[HistoryEntry]) -> Result<()>;

    /// All entries for `order_id`, oldest first.
    async fn history(&self, order_id: Uuid) -> Result<Vec<HistoryEntry>>;

    /// Returns `false` when no such order existed.
    async fn delete_order(&self, id: Uuid) -> Result<bool>;
}

/// Packing slip to insert, seeded from the order's numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackingSlip {
    pub order_id: Uuid,
    pub invoice_number: Option<String>,
    pub so_number: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackingSlipRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub invoice_number: Option<String>,
    pub so_number: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
