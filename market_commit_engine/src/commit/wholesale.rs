//! Wholesale placement: gated by an active access grant, priced at wholesale
//! rates, and rejected all-or-nothing on any MOQ violation.

use chrono::Utc;
use log::*;
use mce_common::MoneyAmount;

use super::{buyer_orders_key, seller_orders_key, CommitEngine, CommitError, Committed, PostCommit};
use crate::{
    domain_types::{
        BuyerId,
        LineInput,
        NewOrder,
        NewOrderItem,
        Order,
        OrderKind,
        Product,
        ProductId,
        SellerId,
    },
    events::{MarketEvent, OrderPlacedEvent},
    pricing::{compute_line_item_totals, compute_wholesale_quote, WholesaleLineInput},
    traits::{CommitStore, ListingCache},
};

#[derive(Debug, Clone)]
pub struct WholesaleOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct WholesaleOrderRequest {
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub lines: Vec<WholesaleOrderLine>,
    pub deposit_percent: u8,
}

impl<B, C> CommitEngine<B, C>
where
    B: CommitStore,
    C: ListingCache,
{
    /// Place a wholesale order. Requires an active wholesale grant between the
    /// buyer and seller; every line must come from that seller and meet the
    /// product's minimum order quantity, or the whole placement is rejected.
    ///
    /// Lines are priced at the product's wholesale price, falling back to the
    /// regular unit price when the seller offers none. Promotions do not apply.
    pub async fn place_wholesale_order(
        &self,
        req: WholesaleOrderRequest,
    ) -> Result<Committed<Order>, CommitError> {
        let now = Utc::now();
        let grant = self.store().fetch_wholesale_access(&req.buyer_id, &req.seller_id).await?;
        if !grant.map(|g| g.is_active(now)).unwrap_or(false) {
            return Err(CommitError::Forbidden(format!(
                "buyer {} has no active wholesale access with seller {}",
                req.buyer_id, req.seller_id
            )));
        }
        if req.lines.is_empty() {
            return Err(CommitError::Validation("a wholesale order needs at least one line".to_string()));
        }

        let mut products: Vec<(Product, u32)> = Vec::with_capacity(req.lines.len());
        let mut quote_lines = Vec::with_capacity(req.lines.len());
        for line in &req.lines {
            let product = self
                .store()
                .fetch_product(&line.product_id)
                .await?
                .ok_or_else(|| CommitError::NotFound(format!("product {}", line.product_id)))?;
            if product.seller_id != req.seller_id {
                return Err(CommitError::Validation(format!(
                    "product {} does not belong to seller {}",
                    product.id, req.seller_id
                )));
            }
            let unit_price = product.wholesale_price.unwrap_or(product.unit_price);
            quote_lines.push(WholesaleLineInput {
                line: LineInput {
                    description: product.name.clone(),
                    unit_price,
                    quantity: line.quantity,
                },
                moq: product.moq,
            });
            products.push((product, line.quantity));
        }

        let quote = compute_wholesale_quote(&quote_lines, req.deposit_percent)?;
        let violations = quote
            .lines
            .iter()
            .zip(&products)
            .filter(|(line, _)| !line.moq_compliant)
            .map(|(_, (product, _))| product.id.to_string())
            .collect::<Vec<_>>();
        if !violations.is_empty() {
            return Err(CommitError::Validation(format!(
                "minimum order quantity not met for: {}",
                violations.join(", ")
            )));
        }

        // Wholesale orders carry no tax or shipping line; totals are the
        // subtotal split into deposit and balance.
        let inputs = quote_lines.iter().map(|l| l.line.clone()).collect::<Vec<_>>();
        let zero = MoneyAmount::zero(quote.subtotal.currency());
        let priced = compute_line_item_totals(&inputs, 0, zero, req.deposit_percent)?;

        let order = NewOrder {
            buyer_id: req.buyer_id.clone(),
            seller_id: req.seller_id.clone(),
            kind: OrderKind::Wholesale,
            totals: priced.totals,
        };
        let items = products
            .iter()
            .zip(&priced.items)
            .map(|((product, quantity), line)| NewOrderItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                image_url: product.image_url.clone(),
                unit_price: line.unit_price,
                quantity: *quantity,
                line_total: line.line_total,
            })
            .collect();

        let order = self.store().commit_wholesale_order(order, items).await?;
        info!(
            "🏭️ Wholesale order {} committed for buyer {} with seller {}",
            order.id, order.buyer_id, order.seller_id
        );

        let effects = PostCommit {
            cache_keys: vec![buyer_orders_key(&order.buyer_id), seller_orders_key(&order.seller_id)],
            events: vec![MarketEvent::OrderPlaced(OrderPlacedEvent { order: order.clone() })],
        };
        Ok(self.finalize(order, effects).await)
    }
}
