//! The pricing service: composes the money primitives and the exchange-rate
//! provider into cart/order/quotation/wholesale total calculations.
//!
//! `compute_line_item_totals` is pure and synchronous. The persisted-record
//! path and the live-preview path both go through it, so identical input
//! always produces identical output. Tax rates are integer basis points
//! (800 = 8%); the only floating point in this module is the exchange rate
//! itself, which is applied and rounded exactly once.

use mce_common::{
    apply_percentage_split,
    line_total,
    round_half_up,
    sum_lines,
    Cents,
    CurrencyCode,
    MoneyAmount,
    MoneyError,
};
use thiserror::Error;

use crate::{
    domain_types::{LineInput, LineItem, Totals, TotalsError},
    exchange::{ExchangeRateError, ExchangeRateProvider},
    traits::RateSource,
};

/// Sanity bound on tax rates: 100% in basis points.
const MAX_TAX_RATE_BPS: u32 = 10_000;

#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("Invalid pricing input: {0}")]
    Validation(String),
    #[error("{0}")]
    Money(#[from] MoneyError),
    #[error("{0}")]
    Totals(#[from] TotalsError),
    #[error("{0}")]
    Rate(#[from] ExchangeRateError),
}

/// The output of pricing a set of lines: each line rounded independently, and
/// the reconciled totals over them.
#[derive(Debug, Clone)]
pub struct PricedLines {
    pub items: Vec<LineItem>,
    pub totals: Totals,
}

/// One wholesale line with its MOQ verdict. Compliance is advisory metadata:
/// the subtotal includes non-compliant lines, and it is the orchestrator's job
/// to reject the placement, not this function's to silently drop lines.
#[derive(Debug, Clone)]
pub struct WholesaleQuoteLine {
    pub item: LineItem,
    pub moq: Option<u32>,
    pub moq_compliant: bool,
}

#[derive(Debug, Clone)]
pub struct WholesaleQuote {
    pub lines: Vec<WholesaleQuoteLine>,
    pub subtotal: MoneyAmount,
    pub deposit: MoneyAmount,
    pub balance: MoneyAmount,
}

/// Input to [`compute_wholesale_quote`]: a priced line plus the product's MOQ.
#[derive(Debug, Clone)]
pub struct WholesaleLineInput {
    pub line: LineInput,
    pub moq: Option<u32>,
}

/// Price a set of lines and assemble reconciled totals.
///
/// Every line total is rounded independently; the subtotal is the sum of the
/// rounded line totals; tax is one rounding over the subtotal; deposit and
/// balance come from a single percentage split so they reconcile exactly.
pub fn compute_line_item_totals(
    lines: &[LineInput],
    tax_rate_bps: u32,
    shipping: MoneyAmount,
    deposit_percent: u8,
) -> Result<PricedLines, PricingError> {
    if tax_rate_bps > MAX_TAX_RATE_BPS {
        return Err(PricingError::Validation(format!("tax rate {tax_rate_bps} bps exceeds 100%")));
    }
    let items = price_lines(lines)?;
    let subtotal = sum_lines(&items.iter().map(|i| i.line_total).collect::<Vec<_>>())?;
    if shipping.currency() != subtotal.currency() {
        return Err(PricingError::Validation(format!(
            "shipping currency {} does not match line currency {}",
            shipping.currency(),
            subtotal.currency()
        )));
    }
    let tax_cents =
        round_half_up(i128::from(subtotal.cents().value()) * i128::from(tax_rate_bps), 10_000);
    let tax = MoneyAmount::new(Cents::from(tax_cents), subtotal.currency())?;
    let grand_total = subtotal.checked_add(&tax)?.checked_add(&shipping)?;
    let (deposit, balance) = apply_percentage_split(&grand_total, deposit_percent)?;
    let totals =
        Totals::reconciled(subtotal, tax, shipping, grand_total, deposit_percent, deposit, balance)?;
    Ok(PricedLines { items, totals })
}

/// Price wholesale lines and attach the MOQ verdict to each.
pub fn compute_wholesale_quote(
    lines: &[WholesaleLineInput],
    deposit_percent: u8,
) -> Result<WholesaleQuote, PricingError> {
    let items = price_lines(&lines.iter().map(|l| l.line.clone()).collect::<Vec<_>>())?;
    let subtotal = sum_lines(&items.iter().map(|i| i.line_total).collect::<Vec<_>>())?;
    let (deposit, balance) = apply_percentage_split(&subtotal, deposit_percent)?;
    let quote_lines = items
        .into_iter()
        .zip(lines)
        .map(|(item, input)| {
            let moq_compliant = input.moq.map(|m| item.quantity >= m).unwrap_or(true);
            WholesaleQuoteLine { item, moq: input.moq, moq_compliant }
        })
        .collect();
    Ok(WholesaleQuote { lines: quote_lines, subtotal, deposit, balance })
}

fn price_lines(lines: &[LineInput]) -> Result<Vec<LineItem>, PricingError> {
    lines
        .iter()
        .map(|line| {
            let total = line_total(&line.unit_price, line.quantity)?;
            Ok(LineItem {
                description: line.description.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: total,
            })
        })
        .collect()
}

/// Thin wrapper over the exchange-rate provider for money conversions.
pub struct PricingApi<S> {
    rates: ExchangeRateProvider<S>,
}

impl<S> PricingApi<S>
where S: RateSource
{
    pub fn new(rates: ExchangeRateProvider<S>) -> Self {
        Self { rates }
    }

    /// Convert an amount into the target currency. Identity when the
    /// currencies already match: no cache lookup, no network. Otherwise the
    /// rate is applied to the cent value and rounded half-up exactly once.
    pub async fn convert_amount(
        &self,
        amount: &MoneyAmount,
        to: CurrencyCode,
    ) -> Result<MoneyAmount, PricingError> {
        if amount.currency() == to {
            return Ok(*amount);
        }
        let rate = self.rates.get_rate(amount.currency(), to).await?;
        let scaled = amount.cents().value() as f64 * rate;
        Ok(MoneyAmount::allow_negative(Cents::from(round_f64_half_up(scaled)), to))
    }
}

fn round_f64_half_up(value: f64) -> i64 {
    if value >= 0.0 {
        (value + 0.5).floor() as i64
    } else {
        (value - 0.5).ceil() as i64
    }
}
