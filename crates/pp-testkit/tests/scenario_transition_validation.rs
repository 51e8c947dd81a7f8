//! Scenario: incomplete transitions are refused with the missing fields, in
//! order, and leave no trace.

use pp_audit::ActionType;
use pp_lifecycle::LifecycleError;
use pp_schemas::{OrderField, OrderStatus, TransitionRequest};
use pp_testkit::{admin, client, Harness};

#[tokio::test]
async fn open_to_ready_without_fields_reports_all_three() {
    let h = Harness::inline();
    let order = h.seed_status(OrderStatus::Open);

    let err = h
        .lifecycle
        .request_transition(order.id, TransitionRequest::to(OrderStatus::Ready), &admin())
        .await
        .unwrap_err();

    match err {
        LifecycleError::Validation { missing_fields } => assert_eq!(
            missing_fields,
            vec![
                OrderField::SoNumber,
                OrderField::InvoiceNumber,
                OrderField::NumberOfPallets
            ]
        ),
        other => panic!("expected validation failure, got {other}"),
    }

    let stored = h.lifecycle.load(order.id).await.unwrap();
    assert_eq!(stored, order, "refused request must not mutate the order");
    assert!(h.lifecycle.history(order.id).await.unwrap().is_empty());
    assert!(h.notifier.sent().is_empty());
    assert!(h.slips.seeds().is_empty());
}

#[tokio::test]
async fn candidate_fields_are_not_saved_when_refused() {
    let h = Harness::inline();
    let order = h.seed_status(OrderStatus::Open);

    let req = TransitionRequest::to(OrderStatus::Ready)
        .so_number("SO-100")
        .invoice_number("INV-5")
        .number_of_pallets("0");
    let err = h.lifecycle.request_transition(order.id, req, &admin()).await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Validation { ref missing_fields } if missing_fields == &vec![OrderField::NumberOfPallets]
    ));
    let stored = h.lifecycle.load(order.id).await.unwrap();
    assert_eq!(stored.so_number, None);
    assert_eq!(stored.invoice_number, None);
}

#[tokio::test]
async fn whitespace_and_non_numeric_input_count_as_missing() {
    let h = Harness::inline();
    let order = h.seed_status(OrderStatus::Open);

    let req = TransitionRequest::to(OrderStatus::Done)
        .so_number("   ")
        .invoice_number("INV-5")
        .number_of_pallets("two");
    let err = h.lifecycle.request_transition(order.id, req, &admin()).await.unwrap_err();

    match err {
        LifecycleError::Validation { missing_fields } => assert_eq!(
            missing_fields,
            vec![OrderField::SoNumber, OrderField::NumberOfPallets]
        ),
        other => panic!("expected validation failure, got {other}"),
    }
}

#[tokio::test]
async fn in_process_only_needs_so_number() {
    let h = Harness::inline();
    let order = h.seed_status(OrderStatus::Open);

    let err = h
        .lifecycle
        .request_transition(order.id, TransitionRequest::to(OrderStatus::InProcess), &client())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Validation { ref missing_fields } if missing_fields == &vec![OrderField::SoNumber]
    ));

    let next = h
        .lifecycle
        .request_transition(
            order.id,
            TransitionRequest::to(OrderStatus::InProcess).so_number("SO-100"),
            &client(),
        )
        .await
        .unwrap();
    assert_eq!(next.status, OrderStatus::InProcess);
}

#[tokio::test]
async fn adjacency_is_not_enforced_when_fields_are_complete() {
    let h = Harness::inline();
    let order = h.seed_status(OrderStatus::Draft);

    let req = TransitionRequest::to(OrderStatus::Done)
        .so_number("SO-7")
        .invoice_number("INV-7")
        .number_of_pallets(" 3 ");
    let done = h.lifecycle.request_transition(order.id, req, &admin()).await.unwrap();

    assert_eq!(done.status, OrderStatus::Done);
    assert_eq!(done.number_of_pallets, Some(3));
    let trail = h.lifecycle.history(order.id).await.unwrap();
    assert_eq!(trail.status_changes(), vec![(OrderStatus::Draft, OrderStatus::Done)]);
    assert_eq!(trail.count(ActionType::StatusChange), 1);
    assert_eq!(trail.count(ActionType::NotificationSent), 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let h = Harness::inline();
    let err = h
        .lifecycle
        .request_transition(uuid::Uuid::new_v4(), TransitionRequest::to(OrderStatus::Open), &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
}

#[tokio::test]
async fn pallet_count_beyond_storage_range_counts_as_missing() {
    let h = Harness::inline();
    let order = h.seed_status(OrderStatus::Open);

    let req = TransitionRequest::to(OrderStatus::Ready)
        .so_number("SO-100")
        .invoice_number("INV-5")
        .number_of_pallets("3000000000");
    let err = h.lifecycle.request_transition(order.id, req, &admin()).await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Validation { ref missing_fields } if missing_fields == &vec![OrderField::NumberOfPallets]
    ));
    assert_eq!(h.lifecycle.load(order.id).await.unwrap(), order);
}
