//! The money primitives: cent-exact line totals, sums, percentage splits and
//! promotional discounts. Pure functions, no I/O.
//!
//! The rounding rules are the load-bearing part of this module:
//! * rounding is always half-up, and happens once per independent quantity;
//! * a sum is always the sum of already-rounded components, never a re-derivation
//!   from an average price;
//! * a percentage split computes the remainder by subtraction so that the two
//!   parts always reconcile exactly with the original total.

use chrono::{DateTime, Utc};

use crate::cents::{Cents, MoneyAmount, MoneyError};

/// Integer division with round-half-up semantics. `denominator` must be positive;
/// negative numerators round half away from zero, which keeps refund splits symmetric.
pub fn round_half_up(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(denominator > 0);
    let rounded = if numerator >= 0 {
        (2 * numerator + denominator) / (2 * denominator)
    } else {
        -((2 * -numerator + denominator) / (2 * denominator))
    };
    rounded as i64
}

/// Multiply a unit price by a quantity. Both operands are integral so no rounding
/// occurs here; decimal unit prices must already have been converted to cents.
pub fn line_total(unit_price: &MoneyAmount, quantity: u32) -> Result<MoneyAmount, MoneyError> {
    if quantity == 0 {
        return Err(MoneyError::NonPositiveQuantity(0));
    }
    let cents = unit_price.cents().value().checked_mul(i64::from(quantity)).ok_or(MoneyError::Overflow)?;
    Ok(MoneyAmount::allow_negative(Cents::from(cents), unit_price.currency()))
}

/// Sum already-rounded line totals. All lines must share a currency.
pub fn sum_lines(lines: &[MoneyAmount]) -> Result<MoneyAmount, MoneyError> {
    let first = lines.first().ok_or(MoneyError::NoLineItems)?;
    let mut acc = MoneyAmount::zero(first.currency());
    for line in lines {
        acc = acc.checked_add(line)?;
    }
    Ok(acc)
}

/// Split a total into `(part, remainder)` by percentage. The remainder is computed
/// by subtraction, so `part + remainder == total` holds exactly for every input.
pub fn apply_percentage_split(
    total: &MoneyAmount,
    percentage: u8,
) -> Result<(MoneyAmount, MoneyAmount), MoneyError> {
    if percentage > 100 {
        return Err(MoneyError::PercentageOutOfRange(i64::from(percentage)));
    }
    let part = round_half_up(i128::from(total.cents().value()) * i128::from(percentage), 100);
    let remainder = total.cents().value() - part;
    Ok((
        MoneyAmount::allow_negative(Cents::from(part), total.currency()),
        MoneyAmount::allow_negative(Cents::from(remainder), total.currency()),
    ))
}

/// Evaluate a promotional discount against a price.
///
/// The discount applies only while the promotion is active and, when an end date is
/// set, strictly before it: a promotion ending exactly `now` is already over.
/// Returns `(effective_price, discount_amount)`.
pub fn apply_promotional_discount(
    original: &MoneyAmount,
    discount_percent: u8,
    active: bool,
    ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(MoneyAmount, MoneyAmount), MoneyError> {
    if discount_percent > 100 {
        return Err(MoneyError::PercentageOutOfRange(i64::from(discount_percent)));
    }
    let live = active && ends_at.map(|end| end > now).unwrap_or(true);
    if !live {
        return Ok((*original, MoneyAmount::zero(original.currency())));
    }
    let (discount, effective) = apply_percentage_split(original, discount_percent)?;
    Ok((effective, discount))
}
