//! History entries: the immutable facts recorded for an order.

use chrono::{DateTime, Utc};
use pp_schemas::{Actor, ActorRole, NotificationKind, OrderStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    OrderCreated,
    StatusChange,
    DocumentUploaded,
    PackingSlipCreated,
    OrderUpdated,
    NotificationSent,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::OrderCreated => "order_created",
            ActionType::StatusChange => "status_change",
            ActionType::DocumentUploaded => "document_uploaded",
            ActionType::PackingSlipCreated => "packing_slip_created",
            ActionType::OrderUpdated => "order_updated",
            ActionType::NotificationSent => "notification_sent",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "order_created" => Ok(ActionType::OrderCreated),
            "status_change" => Ok(ActionType::StatusChange),
            "document_uploaded" => Ok(ActionType::DocumentUploaded),
            "packing_slip_created" => Ok(ActionType::PackingSlipCreated),
            "order_updated" => Ok(ActionType::OrderUpdated),
            "notification_sent" => Ok(ActionType::NotificationSent),
            other => Err(anyhow::anyhow!("invalid history action_type: {}", other)),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
///
/// `status_from` / `status_to` are populated only for
/// [`ActionType::StatusChange`]. Entries are never mutated or deleted once
/// written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub action_type: ActionType,
    pub status_from: Option<OrderStatus>,
    pub status_to: Option<OrderStatus>,
    pub notes: Option<String>,
    pub changed_by_id: Uuid,
    pub changed_by_name: String,
    pub changed_by_role: ActorRole,
    /// Always a JSON object.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn base(order_id: Uuid, action_type: ActionType, actor: &Actor) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            action_type,
            status_from: None,
            status_to: None,
            notes: None,
            changed_by_id: actor.id,
            changed_by_name: actor.name.clone(),
            changed_by_role: actor.role,
            metadata: json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn order_created(order_id: Uuid, status: OrderStatus, actor: &Actor) -> Self {
        let mut e = Self::base(order_id, ActionType::OrderCreated, actor);
        e.metadata = json!({ "initial_status": status.as_str() });
        e
    }

    /// `changes` maps field name to `{ "from": .., "to": .. }` for every gating
    /// field persisted together with the status write.
    pub fn status_change(
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        actor: &Actor,
        notes: Option<String>,
        changes: Value,
    ) -> Self {
        let mut e = Self::base(order_id, ActionType::StatusChange, actor);
        e.status_from = Some(from);
        e.status_to = Some(to);
        e.notes = notes;
        e.metadata = json!({ "field_changes": changes });
        e
    }

    /// Field-only save (status unchanged).
    pub fn order_updated(order_id: Uuid, actor: &Actor, notes: Option<String>, changes: Value) -> Self {
        let mut e = Self::base(order_id, ActionType::OrderUpdated, actor);
        e.notes = notes;
        e.metadata = json!({ "field_changes": changes });
        e
    }

    /// Written by the document-upload flow, which lives outside the lifecycle.
    pub fn document_uploaded(order_id: Uuid, actor: &Actor, document_name: &str, document_type: &str) -> Self {
        let mut e = Self::base(order_id, ActionType::DocumentUploaded, actor);
        e.notes = Some(format!("Uploaded {document_name}"));
        e.metadata = json!({ "document_name": document_name, "document_type": document_type });
        e
    }

    pub fn packing_slip_created(
        order_id: Uuid,
        actor: &Actor,
        automatic: bool,
        invoice_number: Option<&str>,
        so_number: Option<&str>,
    ) -> Self {
        let mut e = Self::base(order_id, ActionType::PackingSlipCreated, actor);
        e.notes = Some(if automatic {
            "Packing slip created automatically".to_string()
        } else {
            "Packing slip created".to_string()
        });
        e.metadata = json!({
            "automatic": automatic,
            "invoice_number": invoice_number,
            "so_number": so_number,
        });
        e
    }

    pub fn notification_sent(order_id: Uuid, actor: &Actor, kind: NotificationKind, status: OrderStatus) -> Self {
        let mut e = Self::base(order_id, ActionType::NotificationSent, actor);
        e.notes = Some(format!("Notification '{}' sent", kind.as_str()));
        e.metadata = json!({ "notification_type": kind.as_str(), "status": status.as_str() });
        e
    }
}
