//! Test doubles and fixtures for the order lifecycle.
//!
//! Everything here is in-process: the [`Harness`] wires an
//! [`OrderLifecycle`] to a `MemoryStore` and two recording collaborators, so
//! scenario tests can assert on what was persisted, notified and created
//! without a database or network.

mod recorders;

pub use recorders::{RecordingNotifier, RecordingPackingSlips};

use pp_db::MemoryStore;
use pp_lifecycle::{AuditJournal, DispatchMode, OrderLifecycle};
use pp_schemas::{Actor, ActorRole, Order, OrderStatus};
use std::sync::Arc;
use uuid::Uuid;

pub fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), "Ops Admin", ActorRole::Admin)
}

pub fn client() -> Actor {
    Actor::new(Uuid::new_v4(), "Partner Buyer", ActorRole::Client)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub slips: Arc<RecordingPackingSlips>,
    pub lifecycle: OrderLifecycle,
}

impl Harness {
    pub fn new(mode: DispatchMode) -> Self {
        Self::build(mode, RecordingNotifier::new(), AuditJournal::disabled())
    }

    pub fn inline() -> Self {
        Self::new(DispatchMode::Inline)
    }

    pub fn build(mode: DispatchMode, notifier: RecordingNotifier, journal: AuditJournal) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let slips = Arc::new(RecordingPackingSlips::new(store.clone()));
        let lifecycle = OrderLifecycle::new(store.clone(), notifier.clone(), slips.clone())
            .with_mode(mode)
            .with_journal(journal);
        Self {
            store,
            notifier,
            slips,
            lifecycle,
        }
    }

    /// Put `order` straight into the store (no history), as an external
    /// intake flow would have.
    pub fn seed(&self, order: Order) -> Order {
        self.store
            .seed(order.clone())
            .unwrap_or_else(|e| panic!("seed order {}: {e:#}", order.id));
        order
    }

    pub fn seed_status(&self, status: OrderStatus) -> Order {
        self.seed(Order::new(Uuid::new_v4(), status))
    }

    /// An order in `status` with every gating field filled in.
    pub fn seed_complete(&self, status: OrderStatus) -> Order {
        let mut o = Order::new(Uuid::new_v4(), status);
        o.so_number = Some("SO-100".to_string());
        o.invoice_number = Some("INV-5".to_string());
        o.number_of_pallets = Some(2);
        self.seed(o)
    }
}
