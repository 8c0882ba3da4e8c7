//! Cart checkout: convert an active, single-seller cart into a retail order.

use chrono::Utc;
use log::*;
use mce_common::MoneyAmount;

use super::{buyer_orders_key, seller_orders_key, CommitEngine, CommitError, Committed, PostCommit};
use crate::{
    domain_types::{BuyerId, CartId, CartStatus, LineInput, NewOrder, NewOrderItem, Order, OrderKind, Product, SellerId},
    events::{MarketEvent, OrderPlacedEvent},
    pricing::compute_line_item_totals,
    traits::{CommitStore, ListingCache},
};

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub buyer_id: BuyerId,
    pub cart_id: CartId,
    /// Tax rate in basis points (e.g. 800 for 8%).
    pub tax_rate_bps: u32,
    /// Defaults to zero in the cart's currency when omitted.
    pub shipping: Option<MoneyAmount>,
    pub deposit_percent: u8,
}

impl<B, C> CommitEngine<B, C>
where
    B: CommitStore,
    C: ListingCache,
{
    /// Check out a cart, creating a retail [`Order`] priced from the products'
    /// current effective prices and closing the cart in the same transaction.
    ///
    /// A cart owned by a different buyer reports as not found rather than
    /// forbidden, so callers cannot probe for other buyers' cart ids.
    pub async fn checkout_cart(&self, req: CheckoutRequest) -> Result<Committed<Order>, CommitError> {
        let cart = self
            .store()
            .fetch_cart(&req.cart_id)
            .await?
            .ok_or_else(|| CommitError::NotFound(format!("cart {}", req.cart_id)))?;
        if cart.buyer_id != req.buyer_id {
            return Err(CommitError::NotFound(format!("cart {}", req.cart_id)));
        }
        if cart.status != CartStatus::Active {
            return Err(CommitError::Validation(format!(
                "cart {} is {} and can no longer be checked out",
                cart.id, cart.status
            )));
        }
        let cart_items = self.store().fetch_cart_items(&req.cart_id).await?;
        if cart_items.is_empty() {
            return Err(CommitError::Validation(format!("cart {} is empty", cart.id)));
        }

        let now = Utc::now();
        let mut seller: Option<SellerId> = None;
        let mut products: Vec<(Product, u32)> = Vec::with_capacity(cart_items.len());
        let mut lines = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            let product = self
                .store()
                .fetch_product(&item.product_id)
                .await?
                .ok_or_else(|| CommitError::NotFound(format!("product {}", item.product_id)))?;
            match &seller {
                None => seller = Some(product.seller_id.clone()),
                Some(s) if *s != product.seller_id => {
                    return Err(CommitError::Validation(format!(
                        "cart {} contains products from more than one seller",
                        cart.id
                    )))
                },
                _ => {},
            }
            let unit_price = product.effective_price(now)?;
            lines.push(LineInput {
                description: product.name.clone(),
                unit_price,
                quantity: item.quantity,
            });
            products.push((product, item.quantity));
        }
        // Non-empty by the check above.
        let seller_id =
            seller.ok_or_else(|| CommitError::Validation(format!("cart {} is empty", cart.id)))?;

        let shipping = req
            .shipping
            .unwrap_or_else(|| MoneyAmount::zero(lines[0].unit_price.currency()));
        let priced = compute_line_item_totals(&lines, req.tax_rate_bps, shipping, req.deposit_percent)?;

        let order = NewOrder {
            buyer_id: req.buyer_id.clone(),
            seller_id: seller_id.clone(),
            kind: OrderKind::Retail,
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

        let order = self.store().commit_checkout(&cart.id, order, items).await?;
        info!("🧾️ Order {} committed from cart {} for buyer {}", order.id, cart.id, order.buyer_id);

        let effects = PostCommit {
            cache_keys: vec![buyer_orders_key(&order.buyer_id), seller_orders_key(&order.seller_id)],
            events: vec![MarketEvent::OrderPlaced(OrderPlacedEvent { order: order.clone() })],
        };
        Ok(self.finalize(order, effects).await)
    }
}
