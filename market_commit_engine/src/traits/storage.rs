use mce_common::MoneyAmount;
use thiserror::Error;

use crate::domain_types::{
    Cart,
    CartId,
    CartItem,
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
    TrackingInfo,
    WholesaleAccess,
    BuyerId,
};

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("The requested {entity} {id} does not exist")]
    NotFound { entity: &'static str, id: String },
    #[error("Concurrent modification detected: {0}")]
    Conflict(String),
}

/// Read-only access for the precondition phase. These run outside the atomic
/// write and never mutate anything.
#[allow(async_fn_in_trait)]
pub trait MarketReads {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, StorageError>;

    async fn fetch_cart(&self, id: &CartId) -> Result<Option<Cart>, StorageError>;

    async fn fetch_cart_items(&self, id: &CartId) -> Result<Vec<CartItem>, StorageError>;

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, StorageError>;

    async fn fetch_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StorageError>;

    async fn fetch_quotation_items(&self, id: &QuotationId) -> Result<Vec<QuotationItem>, StorageError>;

    async fn fetch_payment_schedules(&self, id: &QuotationId) -> Result<Vec<PaymentSchedule>, StorageError>;

    async fn fetch_wholesale_access(
        &self,
        buyer: &BuyerId,
        seller: &SellerId,
    ) -> Result<Option<WholesaleAccess>, StorageError>;
}

/// The change set applied by a fulfillment/refund commit.
#[derive(Debug, Clone)]
pub struct FulfillmentChange {
    pub status: Option<FulfillmentStatus>,
    /// When supplied, cascades to every order item in the same transaction.
    pub tracking: Option<TrackingInfo>,
    pub refund_amount: Option<MoneyAmount>,
}

/// The transactional store behind the commit orchestrator.
///
/// Every `commit_*` method is one atomic, all-or-nothing write: if anything in
/// it fails, no partial state becomes visible and the error surfaces as a
/// failed commit. Writes that carry an `expected_version` must reject the
/// commit with [`StorageError::Conflict`] when the record has moved since the
/// caller's precondition read.
#[allow(async_fn_in_trait)]
pub trait CommitStore: Clone + MarketReads {
    /// Create an order with its item snapshots and mark the source cart
    /// `Completed`, all in one transaction. Fails with `Conflict` if the cart
    /// is no longer active.
    async fn commit_checkout(
        &self,
        cart_id: &CartId,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, StorageError>;

    /// Create a draft quotation with its line rows.
    async fn commit_quotation(
        &self,
        quotation: NewQuotation,
        items: Vec<QuotationItem>,
    ) -> Result<Quotation, StorageError>;

    /// Replace a draft quotation's totals and lines.
    async fn commit_quotation_update(
        &self,
        id: &QuotationId,
        expected_version: u64,
        quotation: NewQuotation,
        items: Vec<QuotationItem>,
    ) -> Result<Quotation, StorageError>;

    /// Transition a quotation's status.
    async fn commit_quotation_status(
        &self,
        id: &QuotationId,
        expected_version: u64,
        status: QuotationStatus,
    ) -> Result<Quotation, StorageError>;

    /// Mark a quotation accepted and create its payment schedule rows. If
    /// schedule rows already exist for the quotation they are kept as-is, so
    /// re-running an accept never duplicates them.
    async fn commit_quotation_accept(
        &self,
        id: &QuotationId,
        expected_version: u64,
        schedule: Vec<PaymentSchedule>,
    ) -> Result<(Quotation, Vec<PaymentSchedule>), StorageError>;

    /// Create a wholesale order with its item snapshots.
    async fn commit_wholesale_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, StorageError>;

    /// Apply a fulfillment change to an order and, when tracking is supplied,
    /// to every one of its items.
    async fn commit_fulfillment_update(
        &self,
        id: &OrderId,
        expected_version: u64,
        change: FulfillmentChange,
    ) -> Result<Order, StorageError>;
}
