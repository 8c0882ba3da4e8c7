use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use log::*;
use mce_common::CurrencyCode;
use tokio::sync::RwLock;

use crate::{
    config::ExchangeConfig,
    traits::{RateSource, RateSourceError},
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ExchangeRateError {
    #[error("Exchange rate source unavailable for {pair} after {attempts} attempts and no fallback exists")]
    UpstreamUnavailable { pair: String, attempts: u32 },
}

type PairKey = (CurrencyCode, CurrencyCode);

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

/// The shared, injectable rate-cache state: a TTL cache plus a last-known-good
/// map that is never expired and only overwritten by a newer successful fetch.
/// Constructed once per process and shared via `Arc`; read-modify-writes per
/// pair go through the locks so concurrent refreshes cannot lose updates.
#[derive(Default)]
pub struct RateCacheState {
    fresh: RwLock<HashMap<PairKey, CachedRate>>,
    last_known_good: RwLock<HashMap<PairKey, f64>>,
}

impl RateCacheState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn fresh_rate(&self, pair: &PairKey, ttl: Duration) -> Option<f64> {
        let cache = self.fresh.read().await;
        cache.get(pair).filter(|entry| entry.fetched_at.elapsed() < ttl).map(|entry| entry.rate)
    }

    async fn store_success(&self, pair: PairKey, rate: f64) {
        self.fresh.write().await.insert(pair, CachedRate { rate, fetched_at: Instant::now() });
        self.last_known_good.write().await.insert(pair, rate);
    }

    async fn last_known_good(&self, pair: &PairKey) -> Option<f64> {
        self.last_known_good.read().await.get(pair).copied()
    }
}

/// The retry loop, made explicit so the transition rules are enforced by
/// structure rather than nested error handling.
#[derive(Debug, Clone, Copy)]
enum FetchPhase {
    Fetching { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Fallback,
    Failed,
}

pub struct ExchangeRateProvider<S> {
    source: S,
    state: Arc<RateCacheState>,
    ttl: Duration,
    max_retries: u32,
    base_delay: Duration,
}

impl<S> ExchangeRateProvider<S>
where S: RateSource
{
    pub fn new(source: S, state: Arc<RateCacheState>, config: &ExchangeConfig) -> Self {
        Self {
            source,
            state,
            ttl: config.ttl,
            max_retries: config.max_retries.max(1),
            base_delay: config.base_delay,
        }
    }

    /// Resolve the conversion rate from `from` to `to`.
    pub async fn get_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<f64, ExchangeRateError> {
        if from == to {
            return Ok(1.0);
        }
        let pair = (from, to);
        if let Some(rate) = self.state.fresh_rate(&pair, self.ttl).await {
            trace!("💱️ Cache hit for {from}->{to}: {rate}");
            return Ok(rate);
        }
        self.fetch_with_fallback(pair).await
    }

    async fn fetch_with_fallback(&self, pair: PairKey) -> Result<f64, ExchangeRateError> {
        let (from, to) = pair;
        let mut phase = FetchPhase::Fetching { attempt: 0 };
        loop {
            phase = match phase {
                FetchPhase::Fetching { attempt } => match self.attempt_fetch(pair).await {
                    Ok(rate) => {
                        debug!("💱️ Fetched {from}->{to} = {rate} on attempt {}", attempt + 1);
                        self.state.store_success(pair, rate).await;
                        return Ok(rate);
                    },
                    Err(e) => {
                        warn!("💱️ Fetch attempt {} for {from}->{to} failed: {e}", attempt + 1);
                        if attempt + 1 >= self.max_retries {
                            FetchPhase::Fallback
                        } else {
                            FetchPhase::Retrying { attempt, delay: self.base_delay * 2u32.pow(attempt) }
                        }
                    },
                },
                FetchPhase::Retrying { attempt, delay } => {
                    trace!("💱️ Backing off {delay:?} before retrying {from}->{to}");
                    tokio::time::sleep(delay).await;
                    FetchPhase::Fetching { attempt: attempt + 1 }
                },
                FetchPhase::Fallback => match self.state.last_known_good(&pair).await {
                    Some(rate) => {
                        warn!(
                            "💱️ All {} fetch attempts for {from}->{to} failed. Using last known good rate {rate}.",
                            self.max_retries
                        );
                        return Ok(rate);
                    },
                    None => FetchPhase::Failed,
                },
                FetchPhase::Failed => {
                    error!("💱️ No rate available for {from}->{to} and no last known good to fall back on.");
                    return Err(ExchangeRateError::UpstreamUnavailable {
                        pair: format!("{from}->{to}"),
                        attempts: self.max_retries,
                    });
                },
            };
        }
    }

    async fn attempt_fetch(&self, pair: PairKey) -> Result<f64, RateSourceError> {
        let (from, to) = pair;
        let table = self.source.fetch_rates(from).await?;
        table.rate_for(to).ok_or(RateSourceError::UnknownCurrency(to))
    }
}
