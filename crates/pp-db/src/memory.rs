use anyhow::{anyhow, Result};
use chrono::Utc;
use pp_audit::HistoryEntry;
use pp_schemas::Order;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::store::{NewPackingSlip, OrderStore, PackingSlipRow};

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    history: Vec<HistoryEntry>,
    packing_slips: Vec<PackingSlipRow>,
}

/// In-process [`OrderStore`] with the same atomicity and monotonic-flag
/// guarantees as [`crate::PgStore`].
///
/// `fail_writes(true)` makes every write return an error without touching the
/// tables, which lets callers exercise their persistence-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Insert an order without any history (fixtures).
    pub fn seed(&self, order: Order) -> Result<()> {
        self.tables()?.orders.insert(order.id, order);
        Ok(())
    }

    pub fn insert_packing_slip(&self, slip: &NewPackingSlip) -> Result<bool> {
        self.check_writable()?;
        let mut t = self.tables()?;
        if t.packing_slips.iter().any(|p| p.order_id == slip.order_id) {
            return Ok(false);
        }
        t.packing_slips.push(PackingSlipRow {
            id: Uuid::new_v4(),
            order_id: slip.order_id,
            invoice_number: slip.invoice_number.clone(),
            so_number: slip.so_number.clone(),
            created_by: slip.created_by,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    pub fn packing_slips(&self, order_id: Uuid) -> Result<Vec<PackingSlipRow>> {
        Ok(self
            .tables()?
            .packing_slips
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store write refused (fail_writes enabled)"));
        }
        Ok(())
    }
}

/// Keep the stored packing-slip triple once set.
fn merge_monotonic(stored: Option<&Order>, incoming: &Order) -> Order {
    let mut next = incoming.clone();
    if let Some(prev) = stored {
        if prev.packing_slip_generated {
            next.packing_slip_generated = true;
            next.packing_slip_generated_at = prev.packing_slip_generated_at;
            next.packing_slip_generated_by = prev.packing_slip_generated_by;
        }
    }
    next
}

#[async_trait::async_trait]
impl OrderStore for MemoryStore {
    async fn load_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables()?.orders.get(&id).cloned())
    }

    async fn insert_order(&self, order: &Order, created: &HistoryEntry) -> Result<()> {
        self.check_writable()?;
        let mut t = self.tables()?;
        if t.orders.contains_key(&order.id) {
            return Err(anyhow!("insert_order failed: order {} already exists", order.id));
        }
        t.orders.insert(order.id, order.clone());
        t.history.push(created.clone());
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        self.check_writable()?;
        let mut t = self.tables()?;
        let Some(prev) = t.orders.get(&order.id) else {
            return Err(anyhow!("update order failed: order {} not found", order.id));
        };
        let next = merge_monotonic(Some(prev), order);
        t.orders.insert(order.id, next);
        Ok(())
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        self.check_writable()?;
        self.tables()?.history.push(entry.clone());
        Ok(())
    }

    async fn commit(&self, order: &Order, entries: &[HistoryEntry]) -> Result<()> {
        self.check_writable()?;
        // Single lock scope: readers never observe the order without its entries.
        let mut t = self.tables()?;
        let Some(prev) = t.orders.get(&order.id) else {
            return Err(anyhow!("update order failed: order {} not found", order.id));
        };
        let next = merge_monotonic(Some(prev), order);
        t.orders.insert(order.id, next);
        t.history.extend(entries.iter().cloned());
        Ok(())
    }

    async fn history(&self, order_id: Uuid) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .tables()?
            .history
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        self.check_writable()?;
        Ok(self.tables()?.orders.remove(&id).is_some())
    }
}
