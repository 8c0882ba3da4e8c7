//! Currency exchange rates: a TTL cache over an unreliable external source,
//! with bounded retries and a last-known-good fallback.
//!
//! The resolution order on every lookup is fixed:
//! 1. same-currency pairs are `1.0`, no I/O, no cache;
//! 2. a fresh cache entry (younger than the TTL) is returned as-is;
//! 3. otherwise the source is fetched with exponential backoff, up to the
//!    configured attempt count. Success refreshes both the TTL cache and the
//!    last-known-good entry.
//! 4. when every attempt fails, the last-known-good rate is returned with a
//!    warning. Only when none exists does the failure surface; a fabricated
//!    rate is never returned.

mod http_source;
mod provider;

pub use http_source::HttpRateSource;
pub use provider::{ExchangeRateError, ExchangeRateProvider, RateCacheState};
