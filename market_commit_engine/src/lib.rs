//! Market Commit Engine
//!
//! The core logic for a multi-tenant marketplace's money handling: exact cent
//! arithmetic, authoritative pricing, currency conversion, and transactional
//! order/quotation workflows. It is transport- and storage-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Storage and cache traits ([`mod@traits`]). Backends implement
//!    [`traits::CommitStore`] (atomic, versioned writes) and
//!    [`traits::ListingCache`]; an in-memory reference backend ships in
//!    [`mod@mem_store`].
//! 2. The commit orchestrator ([`mod@commit`]). Every workflow runs the same
//!    protocol: validate against current state, price server-side, write
//!    atomically, and only then invalidate caches and publish events.
//! 3. Supporting services: the exchange-rate provider ([`mod@exchange`]) with
//!    its TTL cache and last-known-good fallback, the pure pricing functions
//!    ([`mod@pricing`]), and a per-actor rate limiter ([`mod@rate_limit`]).
//!
//! Domain events are emitted after successful commits. A small actor-style
//! channel in [`mod@events`] lets callers subscribe and run custom hooks, for
//! example to push notifications when an order is placed.

pub mod commit;
pub mod config;
pub mod domain_types;
pub mod events;
pub mod exchange;
pub mod mem_store;
pub mod pricing;
pub mod rate_limit;
pub mod traits;

pub use commit::{
    CheckoutRequest,
    CommitEngine,
    CommitError,
    Committed,
    PostCommit,
    QuotationDraft,
    WholesaleOrderLine,
    WholesaleOrderRequest,
};
pub use exchange::{ExchangeRateError, ExchangeRateProvider, HttpRateSource, RateCacheState};
pub use pricing::{compute_line_item_totals, compute_wholesale_quote, PricingApi, PricingError};
pub use rate_limit::{RateLimitError, RateLimiter, Tier};
