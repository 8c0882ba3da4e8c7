//! Shared fixtures for the workflow tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use market_commit_engine::{
    domain_types::{Cart, CartId, CartItem, CartStatus, Product, ProductId, SellerId},
    events::{EventHandlers, EventHooks, MarketEvent},
    mem_store::{MemoryCache, MemoryStore},
    CommitEngine,
};
use mce_common::{Cents, CurrencyCode, MoneyAmount};

pub fn usd() -> CurrencyCode {
    CurrencyCode::new("USD").unwrap()
}

pub fn money(cents: i64) -> MoneyAmount {
    MoneyAmount::new(Cents::from(cents), usd()).unwrap()
}

pub fn product(id: &str, seller: &str, name: &str, unit_cents: i64) -> Product {
    Product {
        id: ProductId::from(id),
        seller_id: SellerId::from(seller),
        name: name.to_string(),
        image_url: Some(format!("https://img.example/{id}.jpg")),
        unit_price: money(unit_cents),
        wholesale_price: None,
        moq: None,
        promotion: None,
    }
}

pub fn active_cart(id: &str, buyer: &str, items: &[(&str, u32)]) -> (Cart, Vec<CartItem>) {
    let now = chrono::Utc::now();
    let cart = Cart {
        id: CartId::from(id),
        buyer_id: buyer.into(),
        status: CartStatus::Active,
        created_at: now,
        updated_at: now,
    };
    let items = items
        .iter()
        .map(|(product_id, quantity)| CartItem {
            cart_id: cart.id.clone(),
            product_id: ProductId::from(*product_id),
            quantity: *quantity,
        })
        .collect();
    (cart, items)
}

pub struct Harness {
    pub engine: CommitEngine<MemoryStore, MemoryCache>,
    pub store: MemoryStore,
    pub cache: MemoryCache,
    pub captured: Arc<Mutex<Vec<MarketEvent>>>,
}

/// A full engine wired to the in-memory backend, with every published event
/// captured for assertions.
pub async fn harness() -> Harness {
    let _ = env_logger::try_init();
    let store = MemoryStore::new();
    let cache = MemoryCache::new();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let mut hooks = EventHooks::default();
    hooks.on_market_event(move |event| {
        let sink = Arc::clone(&sink);
        Box::pin(async move {
            sink.lock().unwrap().push(event);
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let engine = CommitEngine::new(store.clone(), cache.clone(), producers);
    Harness { engine, store, cache, captured }
}

/// Wait until at least `n` events have been captured, or panic after a second.
pub async fn captured_events(harness: &Harness, n: usize) -> Vec<MarketEvent> {
    for _ in 0..100 {
        {
            let events = harness.captured.lock().unwrap();
            if events.len() >= n {
                return events.clone();
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("expected {n} events, got {}", harness.captured.lock().unwrap().len());
}
