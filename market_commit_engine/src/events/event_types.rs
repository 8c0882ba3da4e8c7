use serde::{Deserialize, Serialize};

use crate::domain_types::{Order, PaymentSchedule, Quotation};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdatedEvent {
    pub old_order: Order,
    pub new_order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotationSentEvent {
    pub quotation: Quotation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotationAcceptedEvent {
    pub quotation: Quotation,
    pub schedule: Vec<PaymentSchedule>,
}

/// Every event the engine publishes after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    OrderPlaced(OrderPlacedEvent),
    OrderUpdated(OrderUpdatedEvent),
    QuotationSent(QuotationSentEvent),
    QuotationAccepted(QuotationAcceptedEvent),
}

impl MarketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::OrderPlaced(_) => "order-placed",
            MarketEvent::OrderUpdated(_) => "order-updated",
            MarketEvent::QuotationSent(_) => "quotation-sent",
            MarketEvent::QuotationAccepted(_) => "quotation-accepted",
        }
    }

    /// The actor identities this event should be delivered to.
    pub fn targets(&self) -> Vec<String> {
        match self {
            MarketEvent::OrderPlaced(e) => {
                vec![e.order.buyer_id.to_string(), e.order.seller_id.to_string()]
            },
            MarketEvent::OrderUpdated(e) => vec![e.new_order.buyer_id.to_string()],
            MarketEvent::QuotationSent(e) => vec![e.quotation.buyer_id.to_string()],
            MarketEvent::QuotationAccepted(e) => vec![e.quotation.seller_id.to_string()],
        }
    }
}
