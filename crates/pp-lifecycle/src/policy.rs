//! Read-only queries over an order snapshot. Pure; safe from any number of
//! concurrent readers.

use pp_schemas::{ActorRole, Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Deletion is allowed for drafts (anyone) and cancelled orders (admins only).
pub fn can_delete(order: &Order, role: ActorRole) -> bool {
    match order.status {
        OrderStatus::Draft => true,
        OrderStatus::Cancelled => role == ActorRole::Admin,
        _ => false,
    }
}

/// Clients may only edit `Open` orders. Admins are never locked out; the
/// validator still applies to whatever they save.
pub fn is_edit_locked(order: &Order, role: ActorRole) -> bool {
    match role {
        ActorRole::Admin => false,
        ActorRole::Client => order.status != OrderStatus::Open,
    }
}

pub fn can_manage_packing_slip(order: &Order) -> bool {
    matches!(order.status, OrderStatus::Ready | OrderStatus::Done)
}

/// What the packing-slip control should offer for this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingSlipView {
    /// Status allows it and none exists yet.
    Create,
    /// Already generated; download only.
    Created,
    /// Status does not allow packing slips yet.
    Locked,
}

impl PackingSlipView {
    pub fn message(&self) -> &'static str {
        match self {
            PackingSlipView::Create => "Create packing slip",
            PackingSlipView::Created => "Packing slip already created",
            PackingSlipView::Locked => {
                "Packing slips are available once the order is Ready or Done"
            }
        }
    }
}

pub fn packing_slip_view(order: &Order) -> PackingSlipView {
    if order.packing_slip_generated {
        PackingSlipView::Created
    } else if can_manage_packing_slip(order) {
        PackingSlipView::Create
    } else {
        PackingSlipView::Locked
    }
}

/// Ready for the external order-management sync: status `Ready`/`Done` with
/// both reference numbers present.
pub fn netsuite_ready(order: &Order) -> bool {
    matches!(order.status, OrderStatus::Ready | OrderStatus::Done)
        && has_text(order.so_number.as_deref())
        && has_text(order.invoice_number.as_deref())
}

/// Statuses a request from `role` may target right now. Field completeness
/// is not considered; the validator decides that at request time.
pub fn allowed_targets(order: &Order, role: ActorRole) -> Vec<OrderStatus> {
    if order.status.is_terminal() || is_edit_locked(order, role) {
        return Vec::new();
    }
    OrderStatus::ALL
        .iter()
        .copied()
        .filter(|s| *s != order.status)
        .collect()
}

/// Every query above for one order and role, in a form the UI can render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPermissions {
    pub role: ActorRole,
    pub status: OrderStatus,
    pub can_delete: bool,
    pub edit_locked: bool,
    pub can_manage_packing_slip: bool,
    pub packing_slip: PackingSlipView,
    pub netsuite_ready: bool,
    pub allowed_targets: Vec<OrderStatus>,
}

impl OrderPermissions {
    pub fn for_order(order: &Order, role: ActorRole) -> Self {
        Self {
            role,
            status: order.status,
            can_delete: can_delete(order, role),
            edit_locked: is_edit_locked(order, role),
            can_manage_packing_slip: can_manage_packing_slip(order),
            packing_slip: packing_slip_view(order),
            netsuite_ready: netsuite_ready(order),
            allowed_targets: allowed_targets(order, role),
        }
    }
}

fn has_text(v: Option<&str>) -> bool {
    v.map(|s| !s.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn order(status: OrderStatus) -> Order {
        Order::new(Uuid::new_v4(), status)
    }

    #[test]
    fn deletion_matrix() {
        for s in OrderStatus::ALL {
            let o = order(s);
            let admin = can_delete(&o, ActorRole::Admin);
            let client = can_delete(&o, ActorRole::Client);
            match s {
                OrderStatus::Draft => assert!(admin && client),
                OrderStatus::Cancelled => assert!(admin && !client),
                _ => assert!(!admin && !client, "{s} must not be deletable"),
            }
        }
    }

    #[test]
    fn clients_locked_outside_open_admins_never() {
        for s in OrderStatus::ALL {
            let o = order(s);
            assert!(!is_edit_locked(&o, ActorRole::Admin));
            assert_eq!(is_edit_locked(&o, ActorRole::Client), s != OrderStatus::Open);
        }
    }

    #[test]
    fn packing_slip_view_follows_status_and_flag() {
        assert_eq!(packing_slip_view(&order(OrderStatus::InProcess)), PackingSlipView::Locked);
        assert_eq!(packing_slip_view(&order(OrderStatus::Ready)), PackingSlipView::Create);

        let mut done = order(OrderStatus::Done);
        done.mark_packing_slip_generated(Uuid::new_v4(), chrono::Utc::now());
        assert_eq!(packing_slip_view(&done), PackingSlipView::Created);
    }

    #[test]
    fn netsuite_needs_status_and_both_numbers() {
        let mut o = order(OrderStatus::Ready);
        o.so_number = Some("SO-100".into());
        assert!(!netsuite_ready(&o));
        o.invoice_number = Some("INV-5".into());
        assert!(netsuite_ready(&o));
        o.status = OrderStatus::InProcess;
        assert!(!netsuite_ready(&o));
    }

    #[test]
    fn allowed_targets_empty_for_terminal_and_locked() {
        assert!(allowed_targets(&order(OrderStatus::Done), ActorRole::Admin).is_empty());
        assert!(allowed_targets(&order(OrderStatus::Ready), ActorRole::Client).is_empty());

        let t = allowed_targets(&order(OrderStatus::Open), ActorRole::Client);
        assert_eq!(t.len(), OrderStatus::ALL.len() - 1);
        assert!(t.contains(&OrderStatus::Cancelled));
        assert!(!t.contains(&OrderStatus::Open));
    }
}
