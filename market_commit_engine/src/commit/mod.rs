//! The transactional commit orchestrator.
//!
//! Every workflow here follows the same three-phase protocol:
//! 1. **preconditions**: read-only checks against current storage state;
//! 2. **compute**: authoritative totals from the pricing service (client
//!    totals are never trusted);
//! 3. **atomic write**: one all-or-nothing `commit_*` call on the store;
//! 4. **finalize**: only after the write succeeded, invalidate the affected
//!    listing caches and publish domain events, both best-effort.
//!
//! The ordering is the load-bearing invariant: no side effect outside the
//! store is emitted before the transaction commits, and a failed transaction
//! triggers neither cache invalidation nor events. [`Committed`] makes that
//! structural: effects only exist as part of a successful commit's result.

mod checkout;
mod fulfillment;
mod quotations;
mod wholesale;

use log::*;
use mce_common::MoneyError;
use thiserror::Error;

pub use checkout::CheckoutRequest;
pub use quotations::QuotationDraft;
pub use wholesale::{WholesaleOrderLine, WholesaleOrderRequest};

use crate::{
    domain_types::{BuyerId, SellerId},
    events::{EventProducers, MarketEvent},
    pricing::PricingError,
    traits::{CommitStore, ListingCache, StorageError},
};

#[derive(Debug, Clone, Error)]
pub enum CommitError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("The requested {0} does not exist")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("The transaction failed to commit and was rolled back. {0}")]
    CommitFailed(StorageError),
    #[error("{0}")]
    Pricing(#[from] PricingError),
}

impl From<StorageError> for CommitError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { entity, id } => CommitError::NotFound(format!("{entity} {id}")),
            other => CommitError::CommitFailed(other),
        }
    }
}

impl From<MoneyError> for CommitError {
    fn from(e: MoneyError) -> Self {
        CommitError::Validation(e.to_string())
    }
}

/// The side effects owed after a successful commit: cache prefixes to
/// invalidate and events to publish. Never constructed for a failed write.
#[derive(Debug, Clone, Default)]
pub struct PostCommit {
    pub cache_keys: Vec<String>,
    pub events: Vec<MarketEvent>,
}

/// A committed record together with the post-commit effects that were applied
/// for it.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub record: T,
    pub effects: PostCommit,
}

pub fn buyer_orders_key(id: &BuyerId) -> String {
    format!("orders:buyer:{id}")
}

pub fn seller_orders_key(id: &SellerId) -> String {
    format!("orders:seller:{id}")
}

pub fn buyer_quotations_key(id: &BuyerId) -> String {
    format!("quotations:buyer:{id}")
}

pub fn seller_quotations_key(id: &SellerId) -> String {
    format!("quotations:seller:{id}")
}

/// The orchestrator. Generic over the transactional store and the listing
/// cache; event producers are wired in at construction.
pub struct CommitEngine<B, C> {
    store: B,
    cache: C,
    producers: EventProducers,
}

impl<B, C> CommitEngine<B, C> {
    pub fn new(store: B, cache: C, producers: EventProducers) -> Self {
        Self { store, cache, producers }
    }

    pub fn store(&self) -> &B {
        &self.store
    }
}

impl<B, C> CommitEngine<B, C>
where
    B: CommitStore,
    C: ListingCache,
{
    /// Apply a successful commit's side effects. Failures here are logged and
    /// swallowed: the business transaction already committed, and a cache or
    /// event hiccup must never convert it into a reported failure.
    async fn finalize<T>(&self, record: T, effects: PostCommit) -> Committed<T> {
        for key in &effects.cache_keys {
            match self.cache.delete_pattern(key).await {
                Ok(n) => trace!("🧹️ Invalidated {n} cache entries under {key}"),
                Err(e) => warn!("🧹️ Post-commit cache invalidation for {key} failed: {e}"),
            }
        }
        for event in &effects.events {
            self.producers.publish(event.clone()).await;
        }
        Committed { record, effects }
    }
}
