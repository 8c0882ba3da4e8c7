//! Engine configuration. Everything can be driven from `MCE_*` environment
//! variables; unparseable or missing values fall back to compiled defaults
//! with a logged note, so a partially configured environment still boots.

use std::{env, time::Duration};

use log::*;

const DEFAULT_RATE_TTL_SECS: u64 = 3_600;
const DEFAULT_RATE_MAX_RETRIES: u32 = 3;
const DEFAULT_RATE_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_RATE_FETCH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LIMIT_ANON: u32 = 10;
const DEFAULT_LIMIT_AUTH: u32 = 60;
const DEFAULT_LIMIT_PREMIUM: u32 = 240;
const DEFAULT_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_LIMIT_SWEEP_SECS: u64 = 60;
const DEFAULT_EVENT_BUFFER: usize = 128;

#[derive(Clone, Debug)]
pub struct ExchangeConfig {
    /// Base URL of the external rate source.
    pub source_url: String,
    /// How long a fetched rate stays fresh.
    pub ttl: Duration,
    /// Fetch attempts before falling back to the last known good rate.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub base_delay: Duration,
    /// Per-attempt request timeout so a hung upstream cannot block a request
    /// beyond the bounded retry loop.
    pub fetch_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            ttl: Duration::from_secs(DEFAULT_RATE_TTL_SECS),
            max_retries: DEFAULT_RATE_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RATE_BASE_DELAY_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_RATE_FETCH_TIMEOUT_MS),
        }
    }
}

impl ExchangeConfig {
    pub fn from_env_or_default() -> Self {
        let source_url = env::var("MCE_RATE_SOURCE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MCE_RATE_SOURCE_URL is not set. Rate fetches will fail until it is configured.");
            String::new()
        });
        Self {
            source_url,
            ttl: Duration::from_secs(env_u64("MCE_RATE_TTL_SECS", DEFAULT_RATE_TTL_SECS)),
            max_retries: env_u64("MCE_RATE_MAX_RETRIES", u64::from(DEFAULT_RATE_MAX_RETRIES)) as u32,
            base_delay: Duration::from_millis(env_u64("MCE_RATE_BASE_DELAY_MS", DEFAULT_RATE_BASE_DELAY_MS)),
            fetch_timeout: Duration::from_millis(env_u64(
                "MCE_RATE_FETCH_TIMEOUT_MS",
                DEFAULT_RATE_FETCH_TIMEOUT_MS,
            )),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    pub anonymous_limit: u32,
    pub authenticated_limit: u32,
    pub premium_limit: u32,
    pub window: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            anonymous_limit: DEFAULT_LIMIT_ANON,
            authenticated_limit: DEFAULT_LIMIT_AUTH,
            premium_limit: DEFAULT_LIMIT_PREMIUM,
            window: Duration::from_secs(DEFAULT_LIMIT_WINDOW_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_LIMIT_SWEEP_SECS),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env_or_default() -> Self {
        Self {
            anonymous_limit: env_u64("MCE_LIMIT_ANON", u64::from(DEFAULT_LIMIT_ANON)) as u32,
            authenticated_limit: env_u64("MCE_LIMIT_AUTH", u64::from(DEFAULT_LIMIT_AUTH)) as u32,
            premium_limit: env_u64("MCE_LIMIT_PREMIUM", u64::from(DEFAULT_LIMIT_PREMIUM)) as u32,
            window: Duration::from_secs(env_u64("MCE_LIMIT_WINDOW_SECS", DEFAULT_LIMIT_WINDOW_SECS)),
            sweep_interval: Duration::from_secs(env_u64("MCE_LIMIT_SWEEP_SECS", DEFAULT_LIMIT_SWEEP_SECS)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub exchange: ExchangeConfig,
    pub rate_limit: RateLimitConfig,
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            rate_limit: RateLimitConfig::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        Self {
            exchange: ExchangeConfig::from_env_or_default(),
            rate_limit: RateLimitConfig::from_env_or_default(),
            event_buffer_size: env_u64("MCE_EVENT_BUFFER", DEFAULT_EVENT_BUFFER as u64) as usize,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
