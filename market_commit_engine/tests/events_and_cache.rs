mod support;

use std::time::Duration;

use market_commit_engine::{
    domain_types::CartId,
    events::MarketEvent,
    mem_store::MemoryCache,
    traits::ListingCache,
    CheckoutRequest,
};
use support::{active_cart, captured_events, harness, product};

#[tokio::test]
async fn committed_events_reach_subscribers() {
    let h = harness().await;
    h.store.add_product(product("widget", "acme", "Widget", 10_000));
    let (cart, items) = active_cart("cart-1", "alice", &[("widget", 1)]);
    h.store.add_cart(cart, items);
    let req = CheckoutRequest {
        buyer_id: "alice".into(),
        cart_id: CartId::from("cart-1"),
        tax_rate_bps: 0,
        shipping: None,
        deposit_percent: 0,
    };

    let committed = h.engine.checkout_cart(req).await.unwrap();

    let events = captured_events(&h, 1).await;
    match &events[0] {
        MarketEvent::OrderPlaced(ev) => assert_eq!(ev.order.id, committed.record.id),
        other => panic!("unexpected event {}", other.name()),
    }
    // The event names both parties as notification targets.
    assert_eq!(events[0].targets(), vec!["alice".to_string(), "acme".to_string()]);
}

#[tokio::test]
async fn cache_entries_expire_and_prefix_deletes_count() {
    let cache = MemoryCache::new();
    cache.set("orders:buyer:alice", "[]".to_string(), Duration::from_secs(60)).await.unwrap();
    cache.set("orders:buyer:bob", "[]".to_string(), Duration::from_secs(60)).await.unwrap();
    cache.set("orders:seller:acme", "[]".to_string(), Duration::from_millis(0)).await.unwrap();

    // Zero TTL: already expired.
    assert_eq!(cache.get("orders:seller:acme").await.unwrap(), None);
    assert_eq!(cache.get("orders:buyer:alice").await.unwrap(), Some("[]".to_string()));

    let removed = cache.delete_pattern("orders:buyer:").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(cache.get("orders:buyer:alice").await.unwrap(), None);

    let invalidated = cache.invalidated_keys();
    assert!(invalidated.contains(&"orders:buyer:alice".to_string()));
    assert!(invalidated.contains(&"orders:buyer:bob".to_string()));
}
