use std::collections::HashMap;

use chrono::Utc;
use log::*;
use mce_common::CurrencyCode;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::ExchangeConfig,
    traits::{RateSource, RateSourceError, RateTable},
};

/// The wire shape of the external rate endpoint: a base currency and a table
/// of target-currency rates. Treated as untrusted input.
#[derive(Debug, Deserialize)]
struct RateResponse {
    base: String,
    rates: HashMap<String, f64>,
}

#[derive(Clone)]
pub struct HttpRateSource {
    client: Client,
    url: String,
}

impl HttpRateSource {
    pub fn new(config: &ExchangeConfig) -> Result<Self, RateSourceError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| RateSourceError::Transport(e.to_string()))?;
        Ok(Self { client, url: config.source_url.clone() })
    }
}

/// Turns a decoded response body into a usable [`RateTable`], dropping entries
/// with unrecognised currency codes or non-positive rates. A response for the
/// wrong base, or one that leaves no usable rates, is malformed.
fn validate_response(base: CurrencyCode, body: RateResponse) -> Result<RateTable, RateSourceError> {
    if !body.base.eq_ignore_ascii_case(base.as_str()) {
        return Err(RateSourceError::MalformedResponse(format!(
            "asked for base {base}, got {}",
            body.base
        )));
    }
    let mut rates = HashMap::with_capacity(body.rates.len());
    for (code, rate) in body.rates {
        let code = match CurrencyCode::new(&code) {
            Ok(c) => c,
            Err(_) => {
                warn!("💱️ Skipping unrecognised currency code {code:?} in rate response");
                continue;
            },
        };
        if !rate.is_finite() || rate <= 0.0 {
            warn!("💱️ Skipping non-positive rate {rate} for {code} in rate response");
            continue;
        }
        rates.insert(code, rate);
    }
    if rates.is_empty() {
        return Err(RateSourceError::MalformedResponse("rate table contained no usable rates".into()));
    }
    Ok(RateTable { base, rates, fetched_at: Utc::now() })
}

impl RateSource for HttpRateSource {
    async fn fetch_rates(&self, base: CurrencyCode) -> Result<RateTable, RateSourceError> {
        let url = format!("{}?base={base}", self.url);
        trace!("💱️ GET {url}");
        let response =
            self.client.get(&url).send().await.map_err(|e| RateSourceError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RateSourceError::Transport(format!("rate source returned {}", response.status())));
        }
        let body = response.text().await.map_err(|e| RateSourceError::Transport(e.to_string()))?;
        let body: RateResponse = serde_json::from_str(&body)
            .map_err(|e| RateSourceError::MalformedResponse(e.to_string()))?;
        validate_response(base, body)
    }
}
