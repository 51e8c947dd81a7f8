//! pp-schemas
//!
//! Shared value types for the order lifecycle: statuses, actors, the order
//! snapshot, and the transition request a caller hands to the lifecycle.
//! No logic beyond parsing/formatting lives here.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Every status an order can occupy.
///
/// The serialized form is the label stored in the `orders.status` column
/// ("In Process" carries a space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    Draft,
    Open,
    #[serde(rename = "In Process")]
    InProcess,
    Ready,
    /// **Terminal.**
    Done,
    /// **Terminal.**
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Draft,
        OrderStatus::Open,
        OrderStatus::InProcess,
        OrderStatus::Ready,
        OrderStatus::Done,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Open => "Open",
            OrderStatus::InProcess => "In Process",
            OrderStatus::Ready => "Ready",
            OrderStatus::Done => "Done",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Accepts the stored label as well as the snake_case spelling used on
    /// the command line (`in_process`).
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "draft" => Ok(OrderStatus::Draft),
            "open" => Ok(OrderStatus::Open),
            "in process" => Ok(OrderStatus::InProcess),
            "ready" => Ok(OrderStatus::Ready),
            "done" => Ok(OrderStatus::Done),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(anyhow!(
                "invalid order status '{}'. expected one of: Draft | Open | In Process | Ready | Done | Cancelled",
                other
            )),
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Client,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "admin",
            ActorRole::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(ActorRole::Admin),
            "client" => Ok(ActorRole::Client),
            other => Err(anyhow!("invalid actor role '{}'. expected admin | client", other)),
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user on whose behalf a lifecycle operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// OrderField
// ---------------------------------------------------------------------------

/// The closed set of fields that gate status transitions.
///
/// Declaration order is the order in which missing fields are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    SoNumber,
    InvoiceNumber,
    NumberOfPallets,
}

impl OrderField {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderField::SoNumber => "so_number",
            OrderField::InvoiceNumber => "invoice_number",
            OrderField::NumberOfPallets => "number_of_pallets",
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Lifecycle-relevant snapshot of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    pub invoice_number: Option<String>,
    pub so_number: Option<String>,
    /// Positive when present.
    pub number_of_pallets: Option<u32>,
    /// Monotonic: once true it is never reset.
    pub packing_slip_generated: bool,
    pub packing_slip_generated_at: Option<DateTime<Utc>>,
    pub packing_slip_generated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh order with no gating fields filled in.
    pub fn new(id: Uuid, status: OrderStatus) -> Self {
        Self {
            id,
            status,
            invoice_number: None,
            so_number: None,
            number_of_pallets: None,
            packing_slip_generated: false,
            packing_slip_generated_at: None,
            packing_slip_generated_by: None,
            updated_at: Utc::now(),
        }
    }

    /// Set the packing-slip flag. Has no effect when it is already set, so the
    /// original actor/timestamp are kept.
    pub fn mark_packing_slip_generated(&mut self, by: Uuid, at: DateTime<Utc>) {
        if self.packing_slip_generated {
            return;
        }
        self.packing_slip_generated = true;
        self.packing_slip_generated_at = Some(at);
        self.packing_slip_generated_by = Some(by);
    }
}

// ---------------------------------------------------------------------------
// Transition request
// ---------------------------------------------------------------------------

/// Candidate values for the gating fields, as typed into the editing form.
///
/// `None` leaves the stored value untouched; `Some("")` clears it.
/// `number_of_pallets` stays raw text here; parsing is the validator's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldUpdates {
    pub invoice_number: Option<String>,
    pub so_number: Option<String>,
    pub number_of_pallets: Option<String>,
}

/// Ephemeral request to move an order to `target`, persisting `fields`
/// alongside the status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    #[serde(default)]
    pub fields: FieldUpdates,
    /// Free text recorded on the `status_change` history entry.
    #[serde(default)]
    pub notes: Option<String>,
    /// Optional custom body for the outbound notification.
    #[serde(default)]
    pub notification_message: Option<String>,
}

impl TransitionRequest {
    pub fn to(target: OrderStatus) -> Self {
        Self {
            target,
            fields: FieldUpdates::default(),
            notes: None,
            notification_message: None,
        }
    }

    pub fn so_number(mut self, v: impl Into<String>) -> Self {
        self.fields.so_number = Some(v.into());
        self
    }

    pub fn invoice_number(mut self, v: impl Into<String>) -> Self {
        self.fields.invoice_number = Some(v.into());
        self
    }

    pub fn number_of_pallets(mut self, v: impl Into<String>) -> Self {
        self.fields.number_of_pallets = Some(v.into());
        self
    }

    pub fn notes(mut self, v: impl Into<String>) -> Self {
        self.notes = Some(v.into());
        self
    }

    pub fn notification_message(mut self, v: impl Into<String>) -> Self {
        self.notification_message = Some(v.into());
        self
    }
}

// ---------------------------------------------------------------------------
// NotificationKind
// ---------------------------------------------------------------------------

/// Outbound notification types, one per notifying status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InProcess,
    Ready,
    Cancelled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::InProcess => "in_process",
            NotificationKind::Ready => "ready",
            NotificationKind::Cancelled => "cancelled",
        }
    }

    /// The notification sent when an order enters `status`, if any.
    pub fn for_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::InProcess => Some(NotificationKind::InProcess),
            OrderStatus::Ready => Some(NotificationKind::Ready),
            OrderStatus::Cancelled => Some(NotificationKind::Cancelled),
            OrderStatus::Draft | OrderStatus::Open | OrderStatus::Done => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DispatchMode
// ---------------------------------------------------------------------------

/// How side effects run relative to the request that triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Effects finish before `request_transition` returns.
    Inline,
    /// Effects run on a spawned task; `wait_idle` waits for them.
    #[default]
    Background,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Inline => "inline",
            DispatchMode::Background => "background",
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "background" => Ok(DispatchMode::Background),
            other => Err(anyhow!("invalid dispatch mode: {other} (expected inline|background)")),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip_through_parse() {
        for s in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(s.as_str()).unwrap(), s);
        }
        assert_eq!(OrderStatus::parse("in_process").unwrap(), OrderStatus::InProcess);
        assert!(OrderStatus::parse("shipped").is_err());
    }

    #[test]
    fn in_process_serializes_with_space() {
        let v = serde_json::to_value(OrderStatus::InProcess).unwrap();
        assert_eq!(v, serde_json::json!("In Process"));
    }

    #[test]
    fn only_done_and_cancelled_are_terminal() {
        let terminal: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![OrderStatus::Done, OrderStatus::Cancelled]);
    }

    #[test]
    fn packing_slip_flag_keeps_first_actor() {
        let mut o = Order::new(Uuid::new_v4(), OrderStatus::Ready);
        let first = Uuid::new_v4();
        let t0 = Utc::now();
        o.mark_packing_slip_generated(first, t0);
        o.mark_packing_slip_generated(Uuid::new_v4(), Utc::now());
        assert!(o.packing_slip_generated);
        assert_eq!(o.packing_slip_generated_by, Some(first));
        assert_eq!(o.packing_slip_generated_at, Some(t0));
    }

    #[test]
    fn notification_kinds_cover_notifying_statuses_only() {
        assert_eq!(
            NotificationKind::for_status(OrderStatus::InProcess),
            Some(NotificationKind::InProcess)
        );
        assert_eq!(NotificationKind::for_status(OrderStatus::Done), None);
        assert_eq!(NotificationKind::for_status(OrderStatus::Open), None);
    }

    #[test]
    fn dispatch_mode_parse() {
        assert_eq!(DispatchMode::parse("Inline").unwrap(), DispatchMode::Inline);
        assert_eq!(DispatchMode::parse(" background ").unwrap(), DispatchMode::Background);
        assert!(DispatchMode::parse("sometimes").is_err());
        assert_eq!(DispatchMode::default(), DispatchMode::Background);
        assert_eq!(
            serde_json::to_value(DispatchMode::Inline).unwrap(),
            serde_json::json!("inline")
        );
    }
}
