use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use pp_audit::{ActionType, HistoryEntry};
use pp_schemas::{ActorRole, Order, OrderStatus};
use serde_json::Value;
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::{NewPackingSlip, OrderStore, PackingSlipRow};

/// Postgres-backed [`OrderStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a packing slip. Returns `false` when the order already has one
    /// (the unique constraint on `order_id` swallows the duplicate).
    pub async fn insert_packing_slip(&self, slip: &NewPackingSlip) -> Result<bool> {
        let res = sqlx::query(
            r#"
            insert into packing_slips (id, order_id, invoice_number, so_number, created_by)
            values ($1, $2, $3, $4, $5)
            on conflict (order_id) do nothing
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(slip.order_id)
        .bind(&slip.invoice_number)
        .bind(&slip.so_number)
        .bind(slip.created_by)
        .execute(&self.pool)
        .await
        .context("insert_packing_slip failed")?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn fetch_packing_slip(&self, order_id: Uuid) -> Result<Option<PackingSlipRow>> {
        let row = sqlx::query(
            r#"
            select id, order_id, invoice_number, so_number, created_by, created_at
            from packing_slips
            where order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch_packing_slip failed")?;

        row.map(|r| -> Result<PackingSlipRow> {
            Ok(PackingSlipRow {
                id: r.try_get("id")?,
                order_id: r.try_get("order_id")?,
                invoice_number: r.try_get("invoice_number")?,
                so_number: r.try_get("so_number")?,
                created_by: r.try_get("created_by")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

#[async_trait::async_trait]
impl OrderStore for PgStore {
    async fn load_order(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            select
              id,
              status,
              invoice_number,
              so_number,
              number_of_pallets,
              packing_slip_generated,
              packing_slip_generated_at,
              packing_slip_generated_by,
              updated_at
            from orders
            where id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("load_order failed")?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn insert_order(&self, order: &Order, created: &HistoryEntry) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;

        sqlx::query(
            r#"
            insert into orders (
              id, status, invoice_number, so_number, number_of_pallets,
              packing_slip_generated, packing_slip_generated_at, packing_slip_generated_by, updated_at
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9
            )
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(&order.invoice_number)
        .bind(&order.so_number)
        .bind(pallets_to_db(order.number_of_pallets)?)
        .bind(order.packing_slip_generated)
        .bind(order.packing_slip_generated_at)
        .bind(order.packing_slip_generated_by)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .context("insert_order failed")?;

        insert_history_row(&mut *tx, created).await?;
        tx.commit().await.context("commit insert_order")?;
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        update_order_row(&self.pool, order).await
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        insert_history_row(&self.pool, entry).await
    }

    async fn commit(&self, order: &Order, entries: &[HistoryEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        update_order_row(&mut *tx, order).await?;
        for e in entries {
            insert_history_row(&mut *tx, e).await?;
        }
        tx.commit().await.context("commit order transition")?;
        Ok(())
    }

    async fn history(&self, order_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            select
              id, order_id, action_type, status_from, status_to, notes,
              changed_by_id, changed_by_name, changed_by_role, metadata, created_at
            from order_history
            where order_id = $1
            order by seq asc
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .context("history query failed")?;

        rows.iter().map(history_from_row).collect()
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("delete from orders where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete_order failed")?;
        Ok(res.rows_affected() == 1)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// The packing-slip triple is folded with the stored values so an update can
/// never clear a flag that is already set.
async fn update_order_row<'e, E: PgExecutor<'e>>(ex: E, order: &Order) -> Result<()> {
    let res = sqlx::query(
        r#"
        update orders
        set status = $2,
            invoice_number = $3,
            so_number = $4,
            number_of_pallets = $5,
            packing_slip_generated = orders.packing_slip_generated or $6,
            packing_slip_generated_at = coalesce(orders.packing_slip_generated_at, $7),
            packing_slip_generated_by = coalesce(orders.packing_slip_generated_by, $8),
            updated_at = $9
        where id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(&order.invoice_number)
    .bind(&order.so_number)
    .bind(pallets_to_db(order.number_of_pallets)?)
    .bind(order.packing_slip_generated)
    .bind(order.packing_slip_generated_at)
    .bind(order.packing_slip_generated_by)
    .bind(order.updated_at)
    .execute(ex)
    .await
    .context("update order failed")?;

    if res.rows_affected() != 1 {
        return Err(anyhow!("update order failed: order {} not found", order.id));
    }
    Ok(())
}

async fn insert_history_row<'e, E: PgExecutor<'e>>(ex: E, e: &HistoryEntry) -> Result<()> {
    sqlx::query(
        r#"
        insert into order_history (
          id, order_id, action_type, status_from, status_to, notes,
          changed_by_id, changed_by_name, changed_by_role, metadata, created_at
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
        )
        "#,
    )
    .bind(e.id)
    .bind(e.order_id)
    .bind(e.action_type.as_str())
    .bind(e.status_from.map(|s| s.as_str()))
    .bind(e.status_to.map(|s| s.as_str()))
    .bind(&e.notes)
    .bind(e.changed_by_id)
    .bind(&e.changed_by_name)
    .bind(e.changed_by_role.as_str())
    .bind(&e.metadata)
    .bind(e.created_at)
    .execute(ex)
    .await
    .context("insert order_history failed")?;
    Ok(())
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let pallets: Option<i32> = row.try_get("number_of_pallets")?;
    Ok(Order {
        id: row.try_get("id")?,
        status: OrderStatus::parse(&row.try_get::<String, _>("status")?)?,
        invoice_number: row.try_get("invoice_number")?,
        so_number: row.try_get("so_number")?,
        number_of_pallets: pallets
            .map(u32::try_from)
            .transpose()
            .context("number_of_pallets out of range")?,
        packing_slip_generated: row.try_get("packing_slip_generated")?,
        packing_slip_generated_at: row.try_get::<Option<DateTime<Utc>>, _>("packing_slip_generated_at")?,
        packing_slip_generated_by: row.try_get("packing_slip_generated_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryEntry> {
    let status_from: Option<String> = row.try_get("status_from")?;
    let status_to: Option<String> = row.try_get("status_to")?;
    Ok(HistoryEntry {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        action_type: ActionType::parse(&row.try_get::<String, _>("action_type")?)?,
        status_from: status_from.as_deref().map(OrderStatus::parse).transpose()?,
        status_to: status_to.as_deref().map(OrderStatus::parse).transpose()?,
        notes: row.try_get("notes")?,
        changed_by_id: row.try_get("changed_by_id")?,
        changed_by_name: row.try_get("changed_by_name")?,
        changed_by_role: ActorRole::parse(&row.try_get::<String, _>("changed_by_role")?)?,
        metadata: row.try_get::<Value, _>("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

fn pallets_to_db(n: Option<u32>) -> Result<Option<i32>> {
    n.map(i32::try_from)
        .transpose()
        .context("number_of_pallets exceeds column range")
}
