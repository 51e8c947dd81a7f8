//! Packing-slip creation backed by the order stores.
//!
//! Both stores keep at most one slip per order, which is what makes
//! [`PackingSlipService::create`] idempotent.

use anyhow::Result;
use pp_db::{MemoryStore, NewPackingSlip, PgStore};

use crate::dispatcher::{PackingSlipSeed, PackingSlipService};

fn new_slip(seed: &PackingSlipSeed) -> NewPackingSlip {
    NewPackingSlip {
        order_id: seed.order_id,
        invoice_number: seed.invoice_number.clone(),
        so_number: seed.so_number.clone(),
        created_by: seed.actor_id,
    }
}

#[async_trait::async_trait]
impl PackingSlipService for PgStore {
    async fn create(&self, seed: &PackingSlipSeed) -> Result<bool> {
        self.insert_packing_slip(&new_slip(seed)).await
    }
}

#[async_trait::async_trait]
impl PackingSlipService for MemoryStore {
    async fn create(&self, seed: &PackingSlipSeed) -> Result<bool> {
        self.insert_packing_slip(&new_slip(seed))
    }
}
