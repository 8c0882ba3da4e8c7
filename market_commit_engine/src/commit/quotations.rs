//! Quotation lifecycle: sellers draft, revise and send; buyers accept.

use log::*;
use mce_common::MoneyAmount;

use super::{
    buyer_quotations_key,
    seller_quotations_key,
    CommitEngine,
    CommitError,
    Committed,
    PostCommit,
};
use crate::{
    domain_types::{
        BuyerId,
        LineInput,
        NewQuotation,
        PaymentSchedule,
        Quotation,
        QuotationId,
        QuotationItem,
        QuotationStatus,
        ScheduleStage,
        SellerId,
    },
    events::{MarketEvent, QuotationAcceptedEvent, QuotationSentEvent},
    pricing::{compute_line_item_totals, PricedLines},
    traits::{CommitStore, ListingCache},
};

#[derive(Debug, Clone)]
pub struct QuotationDraft {
    pub buyer_id: BuyerId,
    pub lines: Vec<LineInput>,
    /// Tax rate in basis points.
    pub tax_rate_bps: u32,
    /// Defaults to zero in the lines' currency when omitted.
    pub shipping: Option<MoneyAmount>,
    pub deposit_percent: u8,
}

impl<B, C> CommitEngine<B, C>
where
    B: CommitStore,
    C: ListingCache,
{
    /// Create a draft quotation from a seller to a buyer. Totals are computed
    /// here; the caller supplies only lines and rates.
    pub async fn create_quotation(
        &self,
        seller_id: &SellerId,
        draft: QuotationDraft,
    ) -> Result<Committed<Quotation>, CommitError> {
        let priced = price_draft(&draft)?;
        let quotation = NewQuotation {
            seller_id: seller_id.clone(),
            buyer_id: draft.buyer_id.clone(),
            totals: priced.totals,
        };
        let items = quotation_items(&priced);
        let quotation = self.store().commit_quotation(quotation, items).await?;
        info!("📝️ Quotation {} drafted by seller {}", quotation.id, quotation.seller_id);
        Ok(self.finalize(quotation.clone(), listing_effects(&quotation)).await)
    }

    /// Replace a draft quotation's lines and totals. Only the issuing seller
    /// may edit, and only while the quotation is still a draft.
    pub async fn update_quotation(
        &self,
        seller_id: &SellerId,
        id: &QuotationId,
        draft: QuotationDraft,
    ) -> Result<Committed<Quotation>, CommitError> {
        let current = self.fetch_seller_quotation(seller_id, id).await?;
        if current.status != QuotationStatus::Draft {
            return Err(CommitError::Validation(format!(
                "quotation {id} is {} and can no longer be edited",
                current.status
            )));
        }
        let priced = price_draft(&draft)?;
        let quotation = NewQuotation {
            seller_id: seller_id.clone(),
            buyer_id: draft.buyer_id.clone(),
            totals: priced.totals,
        };
        let items = quotation_items(&priced);
        let quotation =
            self.store().commit_quotation_update(id, current.version, quotation, items).await?;
        info!("📝️ Quotation {id} revised by seller {seller_id}");
        Ok(self.finalize(quotation.clone(), listing_effects(&quotation)).await)
    }

    /// Send a draft quotation to its buyer. Sending is a one-way transition;
    /// a quotation that has left `Draft` cannot be re-sent.
    pub async fn send_quotation(
        &self,
        seller_id: &SellerId,
        id: &QuotationId,
    ) -> Result<Committed<Quotation>, CommitError> {
        let current = self.fetch_seller_quotation(seller_id, id).await?;
        if current.status != QuotationStatus::Draft {
            return Err(CommitError::Validation(format!(
                "quotation {id} is {} and cannot be sent",
                current.status
            )));
        }
        let quotation = self
            .store()
            .commit_quotation_status(id, current.version, QuotationStatus::Sent)
            .await?;
        info!("📤️ Quotation {id} sent to buyer {}", quotation.buyer_id);
        let mut effects = listing_effects(&quotation);
        effects
            .events
            .push(MarketEvent::QuotationSent(QuotationSentEvent { quotation: quotation.clone() }));
        Ok(self.finalize(quotation, effects).await)
    }

    /// Accept a sent quotation on behalf of its buyer, creating the deposit
    /// and balance payment schedule in the same transaction.
    ///
    /// Accepting twice is rejected, and existing schedule rows are never
    /// duplicated even if an accept is retried after a partial failure.
    pub async fn accept_quotation(
        &self,
        buyer_id: &BuyerId,
        id: &QuotationId,
    ) -> Result<Committed<Quotation>, CommitError> {
        let current = self
            .store()
            .fetch_quotation(id)
            .await?
            .ok_or_else(|| CommitError::NotFound(format!("quotation {id}")))?;
        if current.buyer_id != *buyer_id {
            return Err(CommitError::NotFound(format!("quotation {id}")));
        }
        match current.status {
            QuotationStatus::Sent => {},
            QuotationStatus::Accepted => {
                return Err(CommitError::Validation(format!("quotation {id} is already accepted")))
            },
            other => {
                return Err(CommitError::Validation(format!(
                    "quotation {id} is {other} and cannot be accepted"
                )))
            },
        }
        let existing = self.store().fetch_payment_schedules(id).await?;
        let schedule = if existing.is_empty() {
            vec![
                PaymentSchedule {
                    quotation_id: id.clone(),
                    stage: ScheduleStage::Deposit,
                    amount: current.totals.deposit(),
                },
                PaymentSchedule {
                    quotation_id: id.clone(),
                    stage: ScheduleStage::Balance,
                    amount: current.totals.balance(),
                },
            ]
        } else {
            existing
        };
        let (quotation, schedule) =
            self.store().commit_quotation_accept(id, current.version, schedule).await?;
        info!("🤝️ Quotation {id} accepted by buyer {buyer_id}");
        let mut effects = listing_effects(&quotation);
        effects.events.push(MarketEvent::QuotationAccepted(QuotationAcceptedEvent {
            quotation: quotation.clone(),
            schedule,
        }));
        Ok(self.finalize(quotation, effects).await)
    }

    /// Fetch a quotation for a seller-side operation. A quotation issued by a
    /// different seller reports as not found.
    async fn fetch_seller_quotation(
        &self,
        seller_id: &SellerId,
        id: &QuotationId,
    ) -> Result<Quotation, CommitError> {
        let quotation = self
            .store()
            .fetch_quotation(id)
            .await?
            .ok_or_else(|| CommitError::NotFound(format!("quotation {id}")))?;
        if quotation.seller_id != *seller_id {
            return Err(CommitError::NotFound(format!("quotation {id}")));
        }
        Ok(quotation)
    }
}

fn listing_effects(quotation: &Quotation) -> PostCommit {
    PostCommit {
        cache_keys: vec![
            seller_quotations_key(&quotation.seller_id),
            buyer_quotations_key(&quotation.buyer_id),
        ],
        events: Vec::new(),
    }
}

fn price_draft(draft: &QuotationDraft) -> Result<PricedLines, CommitError> {
    if draft.lines.is_empty() {
        return Err(CommitError::Validation("a quotation needs at least one line".to_string()));
    }
    let shipping = draft
        .shipping
        .unwrap_or_else(|| MoneyAmount::zero(draft.lines[0].unit_price.currency()));
    Ok(compute_line_item_totals(&draft.lines, draft.tax_rate_bps, shipping, draft.deposit_percent)?)
}

fn quotation_items(priced: &PricedLines) -> Vec<QuotationItem> {
    priced
        .items
        .iter()
        .map(|line| QuotationItem {
            // The store assigns the quotation id at commit time.
            quotation_id: QuotationId::default(),
            description: line.description.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total,
        })
        .collect()
}
