//! In-memory reference backend.
//!
//! [`MemoryStore`] keeps everything in `Mutex`-guarded maps and implements
//! the same all-or-nothing contract a database transaction would: every
//! `commit_*` method stages its full change set first and merges it into the
//! shared maps only once all checks have passed. The `fail_next_commit` hook
//! aborts exactly at that boundary, which is what the atomicity tests lean on.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
        MutexGuard,
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use log::*;

use crate::{
    domain_types::{
        BuyerId,
        Cart,
        CartId,
        CartItem,
        CartStatus,
        FulfillmentStatus,
        NewOrder,
        NewOrderItem,
        NewQuotation,
        Order,
        OrderId,
        OrderItem,
        PaymentSchedule,
        Product,
        ProductId,
        Quotation,
        QuotationId,
        QuotationItem,
        QuotationStatus,
        SellerId,
        WholesaleAccess,
    },
    traits::{
        CacheError,
        CommitStore,
        FulfillmentChange,
        ListingCache,
        MarketReads,
        StorageError,
    },
};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, Cart>,
    cart_items: HashMap<CartId, Vec<CartItem>>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
    quotations: HashMap<QuotationId, Quotation>,
    quotation_items: HashMap<QuotationId, Vec<QuotationItem>>,
    payment_schedules: HashMap<QuotationId, Vec<PaymentSchedule>>,
    wholesale_access: HashMap<(BuyerId, SellerId), WholesaleAccess>,
    order_seq: u64,
    quotation_seq: u64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit_*` call fail after staging, proving nothing
    /// partial leaks out of an aborted transaction.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn add_product(&self, product: Product) {
        let mut t = self.lock();
        t.products.insert(product.id.clone(), product);
    }

    pub fn add_cart(&self, cart: Cart, items: Vec<CartItem>) {
        let mut t = self.lock();
        t.cart_items.insert(cart.id.clone(), items);
        t.carts.insert(cart.id.clone(), cart);
    }

    pub fn add_wholesale_access(&self, access: WholesaleAccess) {
        let mut t = self.lock();
        t.wholesale_access.insert((access.buyer_id.clone(), access.seller_id.clone()), access);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The injected-failure gate. Sits between staging and merge in every
    /// commit method.
    fn commit_gate(&self) -> Result<(), StorageError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            warn!("🗃️ Injected commit failure");
            return Err(StorageError::Backend("injected commit failure".to_string()));
        }
        Ok(())
    }

    fn next_order_id(t: &mut Tables) -> OrderId {
        t.order_seq += 1;
        OrderId::from(format!("ord-{:06}", t.order_seq))
    }

    fn next_quotation_id(t: &mut Tables) -> QuotationId {
        t.quotation_seq += 1;
        QuotationId::from(format!("quo-{:06}", t.quotation_seq))
    }

    fn build_order(id: OrderId, order: NewOrder) -> Order {
        let now = Utc::now();
        Order {
            id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            kind: order.kind,
            totals: order.totals,
            status: FulfillmentStatus::Pending,
            tracking: None,
            refunded: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn build_order_items(id: &OrderId, items: Vec<NewOrderItem>) -> Vec<OrderItem> {
        items
            .into_iter()
            .map(|i| OrderItem {
                order_id: id.clone(),
                product_id: i.product_id,
                name: i.name,
                image_url: i.image_url,
                unit_price: i.unit_price,
                quantity: i.quantity,
                line_total: i.line_total,
                tracking_number: None,
            })
            .collect()
    }

    fn checked_quotation(
        t: &Tables,
        id: &QuotationId,
        expected_version: u64,
    ) -> Result<Quotation, StorageError> {
        let current = t
            .quotations
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "quotation", id: id.to_string() })?;
        if current.version != expected_version {
            return Err(StorageError::Conflict(format!(
                "quotation {id} is at version {}, expected {expected_version}",
                current.version
            )));
        }
        Ok(current)
    }
}

impl MarketReads for MemoryStore {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, StorageError> {
        Ok(self.lock().products.get(id).cloned())
    }

    async fn fetch_cart(&self, id: &CartId) -> Result<Option<Cart>, StorageError> {
        Ok(self.lock().carts.get(id).cloned())
    }

    async fn fetch_cart_items(&self, id: &CartId) -> Result<Vec<CartItem>, StorageError> {
        Ok(self.lock().cart_items.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, StorageError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, StorageError> {
        Ok(self.lock().order_items.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StorageError> {
        Ok(self.lock().quotations.get(id).cloned())
    }

    async fn fetch_quotation_items(&self, id: &QuotationId) -> Result<Vec<QuotationItem>, StorageError> {
        Ok(self.lock().quotation_items.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_payment_schedules(&self, id: &QuotationId) -> Result<Vec<PaymentSchedule>, StorageError> {
        Ok(self.lock().payment_schedules.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_wholesale_access(
        &self,
        buyer: &BuyerId,
        seller: &SellerId,
    ) -> Result<Option<WholesaleAccess>, StorageError> {
        Ok(self.lock().wholesale_access.get(&(buyer.clone(), seller.clone())).cloned())
    }
}

impl CommitStore for MemoryStore {
    async fn commit_checkout(
        &self,
        cart_id: &CartId,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, StorageError> {
        let mut t = self.lock();
        let cart = t
            .carts
            .get(cart_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "cart", id: cart_id.to_string() })?;
        if cart.status != CartStatus::Active {
            return Err(StorageError::Conflict(format!("cart {cart_id} is no longer active")));
        }
        // Stage.
        let id = Self::next_order_id(&mut t);
        let order = Self::build_order(id.clone(), order);
        let order_items = Self::build_order_items(&id, items);
        let mut closed_cart = cart;
        closed_cart.status = CartStatus::Completed;
        closed_cart.updated_at = Utc::now();
        self.commit_gate()?;
        // Merge.
        t.orders.insert(id.clone(), order.clone());
        t.order_items.insert(id, order_items);
        t.carts.insert(cart_id.clone(), closed_cart);
        Ok(order)
    }

    async fn commit_quotation(
        &self,
        quotation: NewQuotation,
        items: Vec<QuotationItem>,
    ) -> Result<Quotation, StorageError> {
        let mut t = self.lock();
        let id = Self::next_quotation_id(&mut t);
        let now = Utc::now();
        let quotation = Quotation {
            id: id.clone(),
            seller_id: quotation.seller_id,
            buyer_id: quotation.buyer_id,
            status: QuotationStatus::Draft,
            totals: quotation.totals,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let items = items
            .into_iter()
            .map(|mut i| {
                i.quotation_id = id.clone();
                i
            })
            .collect();
        self.commit_gate()?;
        t.quotations.insert(id.clone(), quotation.clone());
        t.quotation_items.insert(id, items);
        Ok(quotation)
    }

    async fn commit_quotation_update(
        &self,
        id: &QuotationId,
        expected_version: u64,
        quotation: NewQuotation,
        items: Vec<QuotationItem>,
    ) -> Result<Quotation, StorageError> {
        let mut t = self.lock();
        let mut updated = Self::checked_quotation(&t, id, expected_version)?;
        updated.buyer_id = quotation.buyer_id;
        updated.totals = quotation.totals;
        updated.version += 1;
        updated.updated_at = Utc::now();
        let items = items
            .into_iter()
            .map(|mut i| {
                i.quotation_id = id.clone();
                i
            })
            .collect();
        self.commit_gate()?;
        t.quotations.insert(id.clone(), updated.clone());
        t.quotation_items.insert(id.clone(), items);
        Ok(updated)
    }

    async fn commit_quotation_status(
        &self,
        id: &QuotationId,
        expected_version: u64,
        status: QuotationStatus,
    ) -> Result<Quotation, StorageError> {
        let mut t = self.lock();
        let mut updated = Self::checked_quotation(&t, id, expected_version)?;
        updated.status = status;
        updated.version += 1;
        updated.updated_at = Utc::now();
        self.commit_gate()?;
        t.quotations.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    async fn commit_quotation_accept(
        &self,
        id: &QuotationId,
        expected_version: u64,
        schedule: Vec<PaymentSchedule>,
    ) -> Result<(Quotation, Vec<PaymentSchedule>), StorageError> {
        let mut t = self.lock();
        let mut updated = Self::checked_quotation(&t, id, expected_version)?;
        updated.status = QuotationStatus::Accepted;
        updated.version += 1;
        updated.updated_at = Utc::now();
        // Existing schedule rows win; an accept retry must not duplicate them.
        let schedule = match t.payment_schedules.get(id) {
            Some(existing) if !existing.is_empty() => existing.clone(),
            _ => schedule,
        };
        self.commit_gate()?;
        t.quotations.insert(id.clone(), updated.clone());
        t.payment_schedules.insert(id.clone(), schedule.clone());
        Ok((updated, schedule))
    }

    async fn commit_wholesale_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, StorageError> {
        let mut t = self.lock();
        let id = Self::next_order_id(&mut t);
        let order = Self::build_order(id.clone(), order);
        let order_items = Self::build_order_items(&id, items);
        self.commit_gate()?;
        t.orders.insert(id.clone(), order.clone());
        t.order_items.insert(id, order_items);
        Ok(order)
    }

    async fn commit_fulfillment_update(
        &self,
        id: &OrderId,
        expected_version: u64,
        change: FulfillmentChange,
    ) -> Result<Order, StorageError> {
        let mut t = self.lock();
        let mut updated = t
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "order", id: id.to_string() })?;
        if updated.version != expected_version {
            return Err(StorageError::Conflict(format!(
                "order {id} is at version {}, expected {expected_version}",
                updated.version
            )));
        }
        if let Some(status) = change.status {
            updated.status = status;
        }
        if let Some(tracking) = &change.tracking {
            updated.tracking = Some(tracking.clone());
        }
        if let Some(refund) = &change.refund_amount {
            updated.refunded = Some(match &updated.refunded {
                Some(prior) => prior
                    .checked_add(refund)
                    .map_err(|e| StorageError::Backend(e.to_string()))?,
                None => *refund,
            });
        }
        updated.version += 1;
        updated.updated_at = Utc::now();
        let items = match &change.tracking {
            Some(tracking) => {
                let mut items = t.order_items.get(id).cloned().unwrap_or_default();
                for item in &mut items {
                    item.tracking_number = Some(tracking.tracking_number.clone());
                }
                Some(items)
            },
            None => None,
        };
        self.commit_gate()?;
        t.orders.insert(id.clone(), updated.clone());
        if let Some(items) = items {
            t.order_items.insert(id.clone(), items);
        }
        Ok(updated)
    }
}

//--------------------------------------    MemoryCache    -----------------------------------------------------------

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Every key removed by `delete` or `delete_pattern`, for assertions.
    invalidated: Vec<String>,
}

/// TTL'd in-memory cache. Remembers which keys were invalidated so tests can
/// assert on post-commit effects.
#[derive(Clone, Default)]
pub struct MemoryCache {
    state: Arc<Mutex<CacheState>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidated_keys(&self) -> Vec<String> {
        self.lock().invalidated.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ListingCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut state = self.lock();
        match state.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                state.entries.remove(key);
                Ok(None)
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut state = self.lock();
        state
            .entries
            .insert(key.to_string(), CacheEntry { value, expires_at: Instant::now() + ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.lock();
        if state.entries.remove(key).is_some() {
            state.invalidated.push(key.to_string());
        }
        Ok(())
    }

    async fn delete_pattern(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut state = self.lock();
        let doomed = state
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect::<Vec<_>>();
        for key in &doomed {
            state.entries.remove(key);
        }
        // Record the prefix itself too, so tests can assert an invalidation
        // happened even when nothing was cached under it yet.
        state.invalidated.push(prefix.to_string());
        state.invalidated.extend(doomed.iter().cloned());
        Ok(doomed.len())
    }
}
