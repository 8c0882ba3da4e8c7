use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Malformed decimal amount: {0}")]
    MalformedDecimal(String),
    #[error("Quantity must be a positive integer, got {0}")]
    NonPositiveQuantity(i64),
    #[error("Percentage must be between 0 and 100, got {0}")]
    PercentageOutOfRange(i64),
    #[error("Currency mismatch: {0} vs {1}")]
    CurrencyMismatch(CurrencyCode, CurrencyCode),
    #[error("Amount may not be negative: {0}")]
    NegativeAmount(Cents),
    #[error("Monetary value overflows the cent range")]
    Overflow,
    #[error("Invalid ISO currency code: {0}")]
    InvalidCurrency(String),
    #[error("At least one line item is required")]
    NoLineItems,
}

//--------------------------------------       Cents       -----------------------------------------------------------
/// An amount of money in integer minor units. All interior arithmetic happens on this type;
/// decimal forms exist only at the boundary.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

crate::op!(binary Cents, Add, add);
crate::op!(binary Cents, Sub, sub);
crate::op!(inplace Cents, SubAssign, sub_assign);
crate::op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parse a decimal string (e.g. "100.00", "33.335") into cents, rounding
    /// half-up on any sub-cent fraction. Anything that is not an optionally
    /// signed decimal number is rejected.
    pub fn from_decimal_str(s: &str) -> Result<Self, MoneyError> {
        let s = s.trim();
        let malformed = || MoneyError::MalformedDecimal(s.to_string());
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(malformed());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| malformed())? };
        let mut frac_digits = frac.chars();
        let d1 = frac_digits.next().map(|c| c as i64 - '0' as i64).unwrap_or(0);
        let d2 = frac_digits.next().map(|c| c as i64 - '0' as i64).unwrap_or(0);
        // Half-up on the third digit; anything after it cannot flip the decision upward
        // except when the third digit is below 5, in which case it never rounds anyway.
        let round_up = frac_digits.next().map(|c| c as i64 - '0' as i64).unwrap_or(0) >= 5;
        let mut cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(d1 * 10 + d2))
            .ok_or(MoneyError::Overflow)?;
        if round_up {
            cents = cents.checked_add(1).ok_or(MoneyError::Overflow)?;
        }
        Ok(Self(if negative { -cents } else { cents }))
    }
}

//--------------------------------------    CurrencyCode   -----------------------------------------------------------
/// A three-letter uppercase ISO 4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        let mut out = [0u8; 3];
        for (i, b) in bytes.iter().enumerate() {
            out[i] = b.to_ascii_uppercase();
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Validated ASCII at construction
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CurrencyCode::new(&s).map_err(de::Error::custom)
    }
}

//--------------------------------------    MoneyAmount    -----------------------------------------------------------
/// An immutable amount of money: integer cents tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyAmount {
    cents: Cents,
    currency: CurrencyCode,
}

impl MoneyAmount {
    /// Construct a non-negative amount. Negative values must go through
    /// [`MoneyAmount::allow_negative`] so that refund/credit flows are explicit.
    pub fn new(cents: Cents, currency: CurrencyCode) -> Result<Self, MoneyError> {
        if cents.is_negative() {
            return Err(MoneyError::NegativeAmount(cents));
        }
        Ok(Self { cents, currency })
    }

    /// Construct an amount that is permitted to be negative (refunds, credit notes).
    pub fn allow_negative(cents: Cents, currency: CurrencyCode) -> Self {
        Self { cents, currency }
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self { cents: Cents::ZERO, currency }
    }

    /// Parse a decimal string at the boundary, rounding half-up to the cent.
    pub fn from_decimal_str(s: &str, currency: CurrencyCode) -> Result<Self, MoneyError> {
        let cents = Cents::from_decimal_str(s)?;
        Self::new(cents, currency)
    }

    pub fn cents(&self) -> Cents {
        self.cents
    }

    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    pub fn checked_add(&self, other: &MoneyAmount) -> Result<MoneyAmount, MoneyError> {
        let other = self.same_currency(other)?;
        let cents = self.cents.value().checked_add(other.cents.value()).ok_or(MoneyError::Overflow)?;
        Ok(Self::allow_negative(Cents::from(cents), self.currency))
    }

    pub fn checked_sub(&self, other: &MoneyAmount) -> Result<MoneyAmount, MoneyError> {
        let other = self.same_currency(other)?;
        let cents = self.cents.value().checked_sub(other.cents.value()).ok_or(MoneyError::Overflow)?;
        Ok(Self::allow_negative(Cents::from(cents), self.currency))
    }

    fn same_currency<'a>(&self, other: &'a MoneyAmount) -> Result<&'a MoneyAmount, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(self.currency, other.currency));
        }
        Ok(other)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.currency, self.cents)
    }
}
