//! Ordered read view over one order's history.

use pp_schemas::OrderStatus;
use uuid::Uuid;

use crate::entry::{ActionType, HistoryEntry};

#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Vec<HistoryEntry>,
}

impl AuditTrail {
    /// Entries are ordered by `created_at`; ties keep their given (append) order.
    pub fn new(mut entries: Vec<HistoryEntry>) -> Self {
        entries.sort_by_key(|e| e.created_at);
        Self { entries }
    }

    /// Keep only entries for `order_id`.
    pub fn for_order(entries: Vec<HistoryEntry>, order_id: Uuid) -> Self {
        Self::new(entries.into_iter().filter(|e| e.order_id == order_id).collect())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn of_type(&self, t: ActionType) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(move |e| e.action_type == t)
    }

    pub fn count(&self, t: ActionType) -> usize {
        self.of_type(t).count()
    }

    /// `(from, to)` pairs of every status change, oldest first.
    pub fn status_changes(&self) -> Vec<(OrderStatus, OrderStatus)> {
        self.of_type(ActionType::StatusChange)
            .filter_map(|e| Some((e.status_from?, e.status_to?)))
            .collect()
    }

    pub fn last_status_change(&self) -> Option<&HistoryEntry> {
        self.of_type(ActionType::StatusChange).last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pp_schemas::{Actor, ActorRole};
    use serde_json::json;

    #[test]
    fn status_changes_come_back_in_time_order() {
        let actor = Actor::new(Uuid::new_v4(), "a", ActorRole::Admin);
        let order_id = Uuid::new_v4();
        let mut late = HistoryEntry::status_change(
            order_id,
            OrderStatus::InProcess,
            OrderStatus::Ready,
            &actor,
            None,
            json!({}),
        );
        let early = HistoryEntry::status_change(
            order_id,
            OrderStatus::Open,
            OrderStatus::InProcess,
            &actor,
            None,
            json!({}),
        );
        late.created_at = early.created_at + Duration::seconds(5);
        let other = HistoryEntry::order_created(Uuid::new_v4(), OrderStatus::Open, &actor);

        let trail = AuditTrail::for_order(vec![late, other, early], order_id);
        assert_eq!(trail.len(), 2);
        assert_eq!(
            trail.status_changes(),
            vec![
                (OrderStatus::Open, OrderStatus::InProcess),
                (OrderStatus::InProcess, OrderStatus::Ready)
            ]
        );
        assert_eq!(
            trail.last_status_change().and_then(|e| e.status_to),
            Some(OrderStatus::Ready)
        );
    }
}
