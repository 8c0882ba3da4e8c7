//! Fulfillment updates: status transitions, tracking, and refunds computed
//! from the order's own price snapshot.

use log::*;
use mce_common::MoneyAmount;

use super::{buyer_orders_key, seller_orders_key, CommitEngine, CommitError, Committed, PostCommit};
use crate::{
    domain_types::{FulfillmentStatus, FulfillmentUpdate, Order, OrderId, ProductId, RefundScope, SellerId},
    events::{MarketEvent, OrderUpdatedEvent},
    traits::{CommitStore, FulfillmentChange, ListingCache},
};

impl<B, C> CommitEngine<B, C>
where
    B: CommitStore,
    C: ListingCache,
{
    /// Apply a seller's fulfillment change to an order: a status transition,
    /// new tracking info, a refund, or any combination, in one transaction.
    ///
    /// Refund amounts are computed from the order's snapshotted line totals,
    /// never from the live catalog, and a refund forces the `Refunded` status.
    /// An order belonging to a different seller reports as not found.
    pub async fn update_fulfillment(
        &self,
        seller_id: &SellerId,
        order_id: &OrderId,
        update: FulfillmentUpdate,
    ) -> Result<Committed<Order>, CommitError> {
        let order = self
            .store()
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| CommitError::NotFound(format!("order {order_id}")))?;
        if order.seller_id != *seller_id {
            return Err(CommitError::NotFound(format!("order {order_id}")));
        }
        if update.status.is_none() && update.tracking.is_none() && update.refund.is_none() {
            return Err(CommitError::Validation("the update requests no changes".to_string()));
        }

        let refund_amount = match &update.refund {
            Some(RefundScope::Full) => Some(order.totals.grand_total()),
            Some(RefundScope::Partial(product_ids)) => {
                if product_ids.is_empty() {
                    return Err(CommitError::Validation(
                        "a partial refund must name at least one order line".to_string(),
                    ));
                }
                Some(self.partial_refund_amount(&order, product_ids).await?)
            },
            None => None,
        };

        // A refund always lands the order in Refunded; an explicit conflicting
        // status in the same request is a caller error.
        let next_status = match (refund_amount.is_some(), update.status) {
            (true, Some(s)) if s != FulfillmentStatus::Refunded => {
                return Err(CommitError::Validation(format!(
                    "a refund moves order {order_id} to Refunded, not {s}"
                )))
            },
            (true, _) => Some(FulfillmentStatus::Refunded),
            (false, s) => s,
        };
        if let Some(next) = next_status {
            if !order.status.can_become(next) {
                return Err(CommitError::Validation(format!(
                    "order {order_id} cannot move from {} to {next}",
                    order.status
                )));
            }
        }

        let change = FulfillmentChange {
            status: next_status,
            tracking: update.tracking,
            refund_amount,
        };
        let new_order =
            self.store().commit_fulfillment_update(order_id, order.version, change).await?;
        info!(
            "🚚️ Order {order_id} updated by seller {seller_id}: {} -> {}",
            order.status, new_order.status
        );

        let effects = PostCommit {
            cache_keys: vec![
                buyer_orders_key(&new_order.buyer_id),
                seller_orders_key(&new_order.seller_id),
            ],
            events: vec![MarketEvent::OrderUpdated(OrderUpdatedEvent {
                old_order: order,
                new_order: new_order.clone(),
            })],
        };
        Ok(self.finalize(new_order, effects).await)
    }

    /// Sum the snapshotted line totals for the named products.
    async fn partial_refund_amount(
        &self,
        order: &Order,
        product_ids: &[ProductId],
    ) -> Result<MoneyAmount, CommitError> {
        let items = self.store().fetch_order_items(&order.id).await?;
        let mut total = MoneyAmount::zero(order.totals.currency());
        for product_id in product_ids {
            let item = items.iter().find(|i| &i.product_id == product_id).ok_or_else(|| {
                CommitError::NotFound(format!("order line for product {product_id}"))
            })?;
            total = total.checked_add(&item.line_total)?;
        }
        Ok(total)
    }
}
