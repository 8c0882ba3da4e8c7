mod support;

use chrono::{Duration, Utc};
use market_commit_engine::{
    domain_types::{CartId, CartStatus, OrderKind, Promotion},
    events::MarketEvent,
    traits::MarketReads,
    CheckoutRequest,
    CommitError,
};
use support::{active_cart, harness, money, product};

fn checkout_request(buyer: &str, cart: &str) -> CheckoutRequest {
    CheckoutRequest {
        buyer_id: buyer.into(),
        cart_id: CartId::from(cart),
        tax_rate_bps: 800,
        shipping: None,
        deposit_percent: 0,
    }
}

#[tokio::test]
async fn checkout_prices_the_cart_and_closes_it() {
    let h = harness().await;
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    h.store.add_product(product("gadget", "acme", "Gadget", 5_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 2), ("gadget", 1)]);
    h.store.add_cart(cart, items);

    let committed = h.engine.checkout_cart(checkout_request("alice", "cart-1")).await.unwrap();
    let order = &committed.record;
    assert_eq!(order.kind, OrderKind::Retail);
    assert_eq!(order.totals.subtotal(), money(25_000));
    assert_eq!(order.totals.tax(), money(2_000));
    assert_eq!(order.totals.grand_total(), money(27_000));
    assert_eq!(order.totals.balance(), money(27_000));

    // The cart is closed in the same transaction.
    let cart = h.store.fetch_cart(&CartId::from("cart-1")).await.unwrap().unwrap();
    assert_eq!(cart.status, CartStatus::Completed);

    // Items snapshot name, image and price.
    let items = h.store.fetch_order_items(&order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    let widget = items.iter().find(|i| i.product_id.as_str() == "widget").unwrap();
    assert_eq!(widget.name, "Widget");
    assert_eq!(widget.unit_price, money(10_000));
    assert_eq!(widget.line_total, money(20_000));

    // Listing caches for both parties are invalidated.
    let invalidated = h.cache.invalidated_keys();
    assert!(invalidated.contains(&"orders:buyer:alice".to_string()));
    assert!(invalidated.contains(&"orders:seller:acme".to_string()));
}

#[tokio::test]
async fn checkout_uses_the_live_promotional_price() {
    let h = harness().await;
    let mut widget = product("widget", "acme", "Widget", 10_000);
    widget.promotion = Some(Promotion {
        discount_percent: 20,
        active: true,
        ends_at: Some(Utc::now() + Duration::hours(1)),
    });
    h.store.add_product(widget);
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 1)]);
    h.store.add_cart(cart, items);

    let committed = h.engine.checkout_cart(checkout_request("alice", "cart-1")).await.unwrap();
    assert_eq!(committed.record.totals.subtotal(), money(8_000));
}

#[tokio::test]
async fn snapshot_prices_survive_catalog_edits() {
    let h = harness().await;
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 1)]);
    h.store.add_cart(cart, items);
    let committed = h.engine.checkout_cart(checkout_request("alice", "cart-1")).await.unwrap();

    // Reprice the product after the fact.
    h.store.add_product(product("widget", "acme", "Widget (new)", 99_999));

    let items = h.store.fetch_order_items(&committed.record.id).await.unwrap();
    assert_eq!(items[0].unit_price, money(10_000));
    assert_eq!(items[0].name, "Widget");
}

#[tokio::test]
async fn someone_elses_cart_reads_as_not_found() {
    let h = harness().await;
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 1)]);
    h.store.add_cart(cart, items);

    let err = h.engine.checkout_cart(checkout_request("mallory", "cart-1")).await.unwrap_err();
    assert!(matches!(err, CommitError::NotFound(_)));
}

#[tokio::test]
async fn empty_and_closed_carts_are_rejected() {
    let h = harness().await;
    let (cart, items) = active_cart("cart-empty", "alice", &[]);
    h.store.add_cart(cart, items);
    let err = h.engine.checkout_cart(checkout_request("alice", "cart-empty")).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));

    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    let (mut cart, items) = active_cart("cart-done", "alice", &[("widget", 1)]);
    cart.status = CartStatus::Completed;
    h.store.add_cart(cart, items);
    let err = h.engine.checkout_cart(checkout_request("alice", "cart-done")).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
}

#[tokio::test]
async fn carts_spanning_sellers_are_rejected() {
    let h = harness().await;
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    h.store.add_product(product("sprocket", "globex", "Sprocket", 4_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 1), ("sprocket", 1)]);
    h.store.add_cart(cart, items);

    let err = h.engine.checkout_cart(checkout_request("alice", "cart-1")).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
}

#[tokio::test]
async fn a_failed_commit_leaves_no_trace() {
    let h = harness().await;
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 1)]);
    h.store.add_cart(cart, items);

    h.store.fail_next_commit();
    let err = h.engine.checkout_cart(checkout_request("alice", "cart-1")).await.unwrap_err();
    assert!(matches!(err, CommitError::CommitFailed(_)));

    // The cart is untouched, nothing was invalidated, nothing was published.
    let cart = h.store.fetch_cart(&CartId::from("cart-1")).await.unwrap().unwrap();
    assert_eq!(cart.status, CartStatus::Active);
    assert!(h.cache.invalidated_keys().is_empty());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.captured.lock().unwrap().is_empty());

    // The failure is one-shot: the retry goes through.
    let committed = h.engine.checkout_cart(checkout_request("alice", "cart-1")).await.unwrap();
    assert!(matches!(committed.effects.events[0], MarketEvent::OrderPlaced(_)));
}
