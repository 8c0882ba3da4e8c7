mod support;

use market_commit_engine::{
    domain_types::{
        CartId,
        FulfillmentStatus,
        FulfillmentUpdate,
        Order,
        RefundScope,
        TrackingInfo,
    },
    traits::MarketReads,
    CheckoutRequest,
    CommitError,
};
use support::{active_cart, harness, money, product, Harness};

/// Seed a two-line order: 2 widgets at 100.00 and 1 gadget at 50.00, taxed at
/// 8% with a 25% deposit.
async fn placed_order(h: &Harness) -> Order {
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    h.store.add_product(product("gadget", "acme", "Gadget", 5_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 2), ("gadget", 1)]);
    h.store.add_cart(cart, items);
    let req = CheckoutRequest {
        buyer_id: "alice".into(),
        cart_id: CartId::from("cart-1"),
        tax_rate_bps: 800,
        shipping: None,
        deposit_percent: 25,
    };
    h.engine.checkout_cart(req).await.unwrap().record
}

fn status(next: FulfillmentStatus) -> FulfillmentUpdate {
    FulfillmentUpdate { status: Some(next), ..Default::default() }
}

#[tokio::test]
async fn shipping_with_tracking_cascades_to_every_line() {
    let h = harness().await;
    let order = placed_order(&h).await;

    let update = FulfillmentUpdate {
        status: Some(FulfillmentStatus::Shipped),
        tracking: Some(TrackingInfo {
            carrier: "DHL".to_string(),
            tracking_number: "JD014600003".to_string(),
        }),
        refund: None,
    };
    let committed = h.engine.update_fulfillment(&"acme".into(), &order.id, update).await.unwrap();
    assert_eq!(committed.record.status, FulfillmentStatus::Shipped);
    assert_eq!(committed.record.version, order.version + 1);

    let items = h.store.fetch_order_items(&order.id).await.unwrap();
    assert!(items.iter().all(|i| i.tracking_number.as_deref() == Some("JD014600003")));
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let h = harness().await;
    let order = placed_order(&h).await;

    // Pending -> Delivered skips shipping.
    let err = h
        .engine
        .update_fulfillment(&"acme".into(), &order.id, status(FulfillmentStatus::Delivered))
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));

    // Refunded is terminal.
    h.engine
        .update_fulfillment(&"acme".into(), &order.id, FulfillmentUpdate {
            refund: Some(RefundScope::Full),
            ..Default::default()
        })
        .await
        .unwrap();
    let err = h
        .engine
        .update_fulfillment(&"acme".into(), &order.id, status(FulfillmentStatus::Processing))
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
}

#[tokio::test]
async fn a_full_refund_uses_the_grand_total() {
    let h = harness().await;
    let order = placed_order(&h).await;

    let update = FulfillmentUpdate { refund: Some(RefundScope::Full), ..Default::default() };
    let committed = h.engine.update_fulfillment(&"acme".into(), &order.id, update).await.unwrap();
    assert_eq!(committed.record.status, FulfillmentStatus::Refunded);
    // 250.00 + 8% tax.
    assert_eq!(committed.record.refunded, Some(money(27_000)));
}

#[tokio::test]
async fn a_partial_refund_sums_the_snapshotted_lines() {
    let h = harness().await;
    let order = placed_order(&h).await;

    // Reprice the catalog first; the refund must come from the snapshot.
    h.store.add_product(product("gadget", "acme", "Gadget", 99_999));

    let update = FulfillmentUpdate {
        refund: Some(RefundScope::Partial(vec!["gadget".into()])),
        ..Default::default()
    };
    let committed = h.engine.update_fulfillment(&"acme".into(), &order.id, update).await.unwrap();
    assert_eq!(committed.record.refunded, Some(money(5_000)));
    assert_eq!(committed.record.status, FulfillmentStatus::Refunded);
}

#[tokio::test]
async fn refund_requests_are_validated() {
    let h = harness().await;
    let order = placed_order(&h).await;

    // Empty partial scope.
    let update = FulfillmentUpdate {
        refund: Some(RefundScope::Partial(Vec::new())),
        ..Default::default()
    };
    let err = h.engine.update_fulfillment(&"acme".into(), &order.id, update).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));

    // A line the order never had.
    let update = FulfillmentUpdate {
        refund: Some(RefundScope::Partial(vec!["sprocket".into()])),
        ..Default::default()
    };
    let err = h.engine.update_fulfillment(&"acme".into(), &order.id, update).await.unwrap_err();
    assert!(matches!(err, CommitError::NotFound(_)));

    // A refund cannot be combined with a non-Refunded status.
    let update = FulfillmentUpdate {
        status: Some(FulfillmentStatus::Shipped),
        refund: Some(RefundScope::Full),
        ..Default::default()
    };
    let err = h.engine.update_fulfillment(&"acme".into(), &order.id, update).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));

    // No-op updates are rejected too.
    let err = h
        .engine
        .update_fulfillment(&"acme".into(), &order.id, FulfillmentUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
}

#[tokio::test]
async fn another_sellers_order_reads_as_not_found() {
    let h = harness().await;
    let order = placed_order(&h).await;

    let err = h
        .engine
        .update_fulfillment(&"globex".into(), &order.id, status(FulfillmentStatus::Processing))
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::NotFound(_)));
}
