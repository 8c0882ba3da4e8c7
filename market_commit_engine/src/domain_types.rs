//! Typed domain records for the commit engine.
//!
//! Everything that crosses the storage boundary is a concrete type with its
//! invariants enforced at construction: ids are string newtypes, statuses are
//! enums with explicit transition rules, and [`Totals`] can only be built in a
//! reconciled state.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use mce_common::{apply_promotional_discount, CurrencyCode, MoneyAmount, MoneyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl<S: Into<String>> From<S> for $name {
            fn from(value: S) -> Self {
                Self(value.into())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(BuyerId);
string_id!(SellerId);
string_id!(ProductId);
string_id!(CartId);
string_id!(OrderId);
string_id!(QuotationId);

//--------------------------------------      Product      -----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub discount_percent: u8,
    pub active: bool,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: SellerId,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: MoneyAmount,
    /// B2B price used for wholesale placements, when the seller offers one.
    pub wholesale_price: Option<MoneyAmount>,
    /// Minimum order quantity for wholesale lines.
    pub moq: Option<u32>,
    pub promotion: Option<Promotion>,
}

impl Product {
    /// The price a buyer pays right now, with any live promotion applied.
    pub fn effective_price(&self, now: DateTime<Utc>) -> Result<MoneyAmount, MoneyError> {
        match &self.promotion {
            Some(promo) => {
                let (effective, _) = apply_promotional_discount(
                    &self.unit_price,
                    promo.discount_percent,
                    promo.active,
                    promo.ends_at,
                    now,
                )?;
                Ok(effective)
            },
            None => Ok(self.unit_price),
        }
    }
}

//--------------------------------------       Cart        -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartStatus {
    Active,
    Completed,
}

impl Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartStatus::Active => write!(f, "Active"),
            CartStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for CartStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            v => Err(ParseStatusError { kind: "cart status", value: v.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub buyer_id: BuyerId,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
}

//--------------------------------------      Totals       -----------------------------------------------------------
/// The money breakdown of an order or quotation. Only constructible in a
/// reconciled state: `grand_total == subtotal + tax + shipping` and
/// `deposit + balance == grand_total`, all in one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    currency: CurrencyCode,
    subtotal: MoneyAmount,
    tax: MoneyAmount,
    shipping: MoneyAmount,
    grand_total: MoneyAmount,
    deposit_percent: u8,
    deposit: MoneyAmount,
    balance: MoneyAmount,
}

#[derive(Debug, Clone, Error)]
#[error("Totals do not reconcile: {0}")]
pub struct TotalsError(String);

impl Totals {
    #[allow(clippy::too_many_arguments)]
    pub fn reconciled(
        subtotal: MoneyAmount,
        tax: MoneyAmount,
        shipping: MoneyAmount,
        grand_total: MoneyAmount,
        deposit_percent: u8,
        deposit: MoneyAmount,
        balance: MoneyAmount,
    ) -> Result<Self, TotalsError> {
        let currency = subtotal.currency();
        for amount in [&tax, &shipping, &grand_total, &deposit, &balance] {
            if amount.currency() != currency {
                return Err(TotalsError(format!("mixed currencies {currency} and {}", amount.currency())));
            }
        }
        if deposit_percent > 100 {
            return Err(TotalsError(format!("deposit percentage {deposit_percent} out of range")));
        }
        let expected_total =
            subtotal.cents().value() + tax.cents().value() + shipping.cents().value();
        if grand_total.cents().value() != expected_total {
            return Err(TotalsError(format!(
                "grand total {} != subtotal {} + tax {} + shipping {}",
                grand_total.cents(),
                subtotal.cents(),
                tax.cents(),
                shipping.cents()
            )));
        }
        if deposit.cents().value() + balance.cents().value() != grand_total.cents().value() {
            return Err(TotalsError(format!(
                "deposit {} + balance {} != total {}",
                deposit.cents(),
                balance.cents(),
                grand_total.cents()
            )));
        }
        Ok(Self { currency, subtotal, tax, shipping, grand_total, deposit_percent, deposit, balance })
    }

    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    pub fn subtotal(&self) -> MoneyAmount {
        self.subtotal
    }

    pub fn tax(&self) -> MoneyAmount {
        self.tax
    }

    pub fn shipping(&self) -> MoneyAmount {
        self.shipping
    }

    pub fn grand_total(&self) -> MoneyAmount {
        self.grand_total
    }

    pub fn deposit_percent(&self) -> u8 {
        self.deposit_percent
    }

    pub fn deposit(&self) -> MoneyAmount {
        self.deposit
    }

    pub fn balance(&self) -> MoneyAmount {
        self.balance
    }
}

//--------------------------------------     LineItem      -----------------------------------------------------------
/// Input for the pricing calculator: a description, a unit price already in
/// cents, and a positive quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineInput {
    pub description: String,
    pub unit_price: MoneyAmount,
    pub quantity: u32,
}

/// A priced line: the unit price multiplied out, rounded exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub unit_price: MoneyAmount,
    pub quantity: u32,
    pub line_total: MoneyAmount,
}

//--------------------------------------       Order       -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Retail,
    Wholesale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Refunded,
}

impl FulfillmentStatus {
    /// Legal forward transitions. Refunds are reachable from any non-terminal
    /// state; `Refunded` is terminal.
    pub fn can_become(self, next: FulfillmentStatus) -> bool {
        use FulfillmentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Shipped)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Refunded)
                | (Processing, Refunded)
                | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "Pending"),
            FulfillmentStatus::Processing => write!(f, "Processing"),
            FulfillmentStatus::Shipped => write!(f, "Shipped"),
            FulfillmentStatus::Delivered => write!(f, "Delivered"),
            FulfillmentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Refunded" => Ok(Self::Refunded),
            v => Err(ParseStatusError { kind: "fulfillment status", value: v.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub carrier: String,
    pub tracking_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub kind: OrderKind,
    pub totals: Totals,
    pub status: FulfillmentStatus,
    pub tracking: Option<TrackingInfo>,
    /// Total refunded so far, if any. Computed from the order's own snapshot prices.
    pub refunded: Option<MoneyAmount>,
    /// Bumped on every committed write; stale writers are rejected.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order items snapshot the product's name, image and price at placement time,
/// so later catalog edits never retroactively change a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: MoneyAmount,
    pub quantity: u32,
    pub line_total: MoneyAmount,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub kind: OrderKind,
    pub totals: Totals,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: MoneyAmount,
    pub quantity: u32,
    pub line_total: MoneyAmount,
}

//--------------------------------------     Quotation     -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
}

impl Display for QuotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotationStatus::Draft => write!(f, "Draft"),
            QuotationStatus::Sent => write!(f, "Sent"),
            QuotationStatus::Accepted => write!(f, "Accepted"),
            QuotationStatus::Declined => write!(f, "Declined"),
        }
    }
}

impl FromStr for QuotationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Sent" => Ok(Self::Sent),
            "Accepted" => Ok(Self::Accepted),
            "Declined" => Ok(Self::Declined),
            v => Err(ParseStatusError { kind: "quotation status", value: v.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub seller_id: SellerId,
    pub buyer_id: BuyerId,
    pub status: QuotationStatus,
    pub totals: Totals,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotationItem {
    pub quotation_id: QuotationId,
    pub description: String,
    pub unit_price: MoneyAmount,
    pub quantity: u32,
    pub line_total: MoneyAmount,
}

#[derive(Debug, Clone)]
pub struct NewQuotation {
    pub seller_id: SellerId,
    pub buyer_id: BuyerId,
    pub totals: Totals,
}

//--------------------------------------  PaymentSchedule  -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStage {
    Deposit,
    Balance,
}

impl Display for ScheduleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStage::Deposit => write!(f, "Deposit"),
            ScheduleStage::Balance => write!(f, "Balance"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub quotation_id: QuotationId,
    pub stage: ScheduleStage,
    pub amount: MoneyAmount,
}

//-------------------------------------- WholesaleAccess   -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStatus {
    Pending,
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WholesaleAccess {
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub status: AccessStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

impl WholesaleAccess {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == AccessStatus::Active && self.expires_at.map(|t| t > now).unwrap_or(true)
    }
}

//--------------------------------------    Fulfillment    -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundScope {
    Full,
    /// Refund only the named order lines. Empty is rejected up front.
    Partial(Vec<ProductId>),
}

/// A seller's requested change to an order: any combination of a status
/// transition, new tracking info (cascaded to every line), and a refund.
#[derive(Debug, Clone, Default)]
pub struct FulfillmentUpdate {
    pub status: Option<FulfillmentStatus>,
    pub tracking: Option<TrackingInfo>,
    pub refund: Option<RefundScope>,
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use mce_common::Cents;

    use super::*;

    fn usd(cents: i64) -> MoneyAmount {
        MoneyAmount::new(Cents::from(cents), CurrencyCode::new("USD").unwrap()).unwrap()
    }

    #[test]
    fn totals_must_reconcile() {
        let ok = Totals::reconciled(usd(25_000), usd(2_000), usd(0), usd(27_000), 0, usd(0), usd(27_000));
        assert!(ok.is_ok());
        let bad_total = Totals::reconciled(usd(25_000), usd(2_000), usd(0), usd(27_001), 0, usd(0), usd(27_001));
        assert!(bad_total.is_err());
        let bad_split = Totals::reconciled(usd(25_000), usd(2_000), usd(0), usd(27_000), 50, usd(13_000), usd(13_999));
        assert!(bad_split.is_err());
    }

    #[test]
    fn fulfillment_transitions() {
        use FulfillmentStatus::*;
        assert!(Pending.can_become(Processing));
        assert!(Shipped.can_become(Delivered));
        assert!(Delivered.can_become(Refunded));
        assert!(!Refunded.can_become(Pending));
        assert!(!Delivered.can_become(Shipped));
        assert!(!Pending.can_become(Pending));
    }

    #[test]
    fn promotional_price_applies_only_while_live() {
        let now = Utc::now();
        let mut product = Product {
            id: "p-1".into(),
            seller_id: "s-1".into(),
            name: "Widget".into(),
            image_url: None,
            unit_price: usd(10_000),
            wholesale_price: None,
            moq: None,
            promotion: Some(Promotion {
                discount_percent: 10,
                active: true,
                ends_at: Some(now + Duration::hours(1)),
            }),
        };
        assert_eq!(product.effective_price(now).unwrap(), usd(9_000));
        product.promotion = Some(Promotion { discount_percent: 10, active: true, ends_at: Some(now) });
        assert_eq!(product.effective_price(now).unwrap(), usd(10_000));
    }

    #[test]
    fn access_grant_expiry() {
        let now = Utc::now();
        let mut access = WholesaleAccess {
            buyer_id: "b-1".into(),
            seller_id: "s-1".into(),
            status: AccessStatus::Active,
            expires_at: Some(now + Duration::days(30)),
        };
        assert!(access.is_active(now));
        access.expires_at = Some(now);
        assert!(!access.is_active(now));
        access.expires_at = None;
        access.status = AccessStatus::Revoked;
        assert!(!access.is_active(now));
    }
}
