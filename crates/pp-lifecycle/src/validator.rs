//! Field-completeness guard for status transitions.
//!
//! Pure: no I/O, no clock. The rule table below is the only place the
//! per-status requirements are written down.

use pp_schemas::{FieldUpdates, Order, OrderField, OrderStatus};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Fields each tier adds on top of the tiers below it.
const TIERS: &[&[OrderField]] = &[
    // tier 1: In Process
    &[OrderField::SoNumber],
    // tier 2: Ready, Done
    &[OrderField::InvoiceNumber, OrderField::NumberOfPallets],
];

fn tier_for(target: OrderStatus) -> usize {
    match target {
        OrderStatus::Draft | OrderStatus::Open | OrderStatus::Cancelled => 0,
        OrderStatus::InProcess => 1,
        OrderStatus::Ready | OrderStatus::Done => 2,
    }
}

/// Every field `target` requires, in reporting order.
pub fn required_fields(target: OrderStatus) -> Vec<OrderField> {
    let mut out: Vec<OrderField> = TIERS[..tier_for(target)]
        .iter()
        .flat_map(|t| t.iter().copied())
        .collect();
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// Merged view
// ---------------------------------------------------------------------------

/// Stored fields with the request's candidates laid over them, normalized.
///
/// Text fields are trimmed; empty text becomes `None`. `number_of_pallets` is
/// `None` whenever the candidate text is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFields {
    pub so_number: Option<String>,
    pub invoice_number: Option<String>,
    pub number_of_pallets: Option<u32>,
}

impl MergedFields {
    pub fn merge(order: &Order, updates: &FieldUpdates) -> Self {
        Self {
            so_number: merge_text(order.so_number.as_deref(), updates.so_number.as_deref()),
            invoice_number: merge_text(
                order.invoice_number.as_deref(),
                updates.invoice_number.as_deref(),
            ),
            number_of_pallets: match updates.number_of_pallets.as_deref() {
                None => order.number_of_pallets.filter(|n| *n > 0),
                Some(raw) => parse_pallets(raw),
            },
        }
    }

    fn is_present(&self, field: OrderField) -> bool {
        match field {
            OrderField::SoNumber => self.so_number.is_some(),
            OrderField::InvoiceNumber => self.invoice_number.is_some(),
            OrderField::NumberOfPallets => self.number_of_pallets.is_some(),
        }
    }

    /// Write the merged values into `order` and return what changed as
    /// `{ field: { "from": old, "to": new } }`.
    pub fn apply_to(&self, order: &mut Order) -> Value {
        let mut changes = Map::new();

        if order.so_number != self.so_number {
            changes.insert(
                OrderField::SoNumber.as_str().to_string(),
                json!({ "from": order.so_number, "to": self.so_number }),
            );
            order.so_number = self.so_number.clone();
        }
        if order.invoice_number != self.invoice_number {
            changes.insert(
                OrderField::InvoiceNumber.as_str().to_string(),
                json!({ "from": order.invoice_number, "to": self.invoice_number }),
            );
            order.invoice_number = self.invoice_number.clone();
        }
        if order.number_of_pallets != self.number_of_pallets {
            changes.insert(
                OrderField::NumberOfPallets.as_str().to_string(),
                json!({ "from": order.number_of_pallets, "to": self.number_of_pallets }),
            );
            order.number_of_pallets = self.number_of_pallets;
        }

        Value::Object(changes)
    }
}

fn merge_text(stored: Option<&str>, candidate: Option<&str>) -> Option<String> {
    let raw = match candidate {
        Some(c) => c,
        None => stored?,
    };
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Parse form text into a pallet count. Anything but a positive integer is
/// treated as absent. The stored column is a signed 32-bit integer, so counts
/// above `i32::MAX` are absent too.
pub fn parse_pallets(raw: &str) -> Option<u32> {
    match raw.trim().parse::<i32>() {
        Ok(n) if n > 0 => u32::try_from(n).ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Missing required fields for `target`, in reporting order. Empty means the
/// transition is allowed.
pub fn validate(target: OrderStatus, merged: &MergedFields) -> Vec<OrderField> {
    required_fields(target)
        .into_iter()
        .filter(|f| !merged.is_present(*f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn open() -> Order {
        Order::new(Uuid::new_v4(), OrderStatus::Open)
    }

    fn merged(so: Option<&str>, inv: Option<&str>, pallets: Option<&str>) -> MergedFields {
        MergedFields::merge(
            &open(),
            &FieldUpdates {
                so_number: so.map(String::from),
                invoice_number: inv.map(String::from),
                number_of_pallets: pallets.map(String::from),
            },
        )
    }

    #[test]
    fn statuses_without_requirements_always_pass() {
        let empty = merged(None, None, None);
        for s in [OrderStatus::Draft, OrderStatus::Open, OrderStatus::Cancelled] {
            assert!(validate(s, &empty).is_empty(), "{s} should need nothing");
        }
    }

    #[test]
    fn ready_reports_all_three_in_order() {
        let empty = merged(None, None, None);
        assert_eq!(
            validate(OrderStatus::Ready, &empty),
            vec![
                OrderField::SoNumber,
                OrderField::InvoiceNumber,
                OrderField::NumberOfPallets
            ]
        );
    }

    #[test]
    fn done_inherits_ready() {
        assert_eq!(
            required_fields(OrderStatus::Done),
            required_fields(OrderStatus::Ready)
        );
    }

    #[test]
    fn in_process_needs_only_so_number() {
        assert_eq!(
            validate(OrderStatus::InProcess, &merged(None, None, None)),
            vec![OrderField::SoNumber]
        );
        assert!(validate(OrderStatus::InProcess, &merged(Some("SO-1"), None, None)).is_empty());
    }

    #[test]
    fn whitespace_text_counts_as_missing() {
        let m = merged(Some("   "), Some("\t"), Some("2"));
        assert_eq!(
            validate(OrderStatus::Ready, &m),
            vec![OrderField::SoNumber, OrderField::InvoiceNumber]
        );
    }

    #[test]
    fn pallets_must_be_positive_integer() {
        assert_eq!(parse_pallets(" 3 "), Some(3));
        assert_eq!(parse_pallets("0"), None);
        assert_eq!(parse_pallets("-2"), None);
        assert_eq!(parse_pallets("two"), None);
        assert_eq!(parse_pallets("1.5"), None);
        assert_eq!(parse_pallets(""), None);
    }

    #[test]
    fn pallets_beyond_storage_range_are_absent() {
        assert_eq!(parse_pallets("2147483647"), Some(i32::MAX as u32));
        assert_eq!(parse_pallets("2147483648"), None);
        assert_eq!(parse_pallets("3000000000"), None);
    }

    #[test]
    fn candidate_overrides_stored_and_empty_clears() {
        let mut order = open();
        order.so_number = Some("SO-1".into());
        order.invoice_number = Some("INV-1".into());

        let m = MergedFields::merge(
            &order,
            &FieldUpdates {
                so_number: Some("SO-2".into()),
                invoice_number: Some(String::new()),
                number_of_pallets: None,
            },
        );
        assert_eq!(m.so_number.as_deref(), Some("SO-2"));
        assert_eq!(m.invoice_number, None);
    }

    #[test]
    fn apply_reports_only_real_changes() {
        let mut order = open();
        order.so_number = Some("SO-1".into());

        let m = MergedFields::merge(
            &order,
            &FieldUpdates {
                so_number: Some(" SO-1 ".into()),
                number_of_pallets: Some("4".into()),
                ..FieldUpdates::default()
            },
        );
        let changes = m.apply_to(&mut order);

        assert_eq!(changes, json!({ "number_of_pallets": { "from": null, "to": 4 } }));
        assert_eq!(order.number_of_pallets, Some(4));
    }
}
