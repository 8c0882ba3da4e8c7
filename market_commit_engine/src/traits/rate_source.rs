use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mce_common::CurrencyCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RateSourceError {
    #[error("Rate source transport error: {0}")]
    Transport(String),
    #[error("Rate source returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("Rate source does not know currency {0}")]
    UnknownCurrency(CurrencyCode),
}

/// One fetch result from the external rate source: a base currency and the
/// table of target-currency rates. The source is untrusted, so rates are
/// validated before use.
#[derive(Debug, Clone)]
pub struct RateTable {
    pub base: CurrencyCode,
    pub rates: HashMap<CurrencyCode, f64>,
    pub fetched_at: DateTime<Utc>,
}

impl RateTable {
    /// The rate for `target`, if present and positive.
    pub fn rate_for(&self, target: CurrencyCode) -> Option<f64> {
        self.rates.get(&target).copied().filter(|r| r.is_finite() && *r > 0.0)
    }
}

/// The external currency rate source. May be down, slow, or malformed; the
/// provider layer owns retries and fallback.
#[allow(async_fn_in_trait)]
pub trait RateSource {
    async fn fetch_rates(&self, base: CurrencyCode) -> Result<RateTable, RateSourceError>;
}
