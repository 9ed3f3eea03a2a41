//! Amount type for handling monetary values.
//!
//! This module provides the `Amount` type which wraps `Decimal`. User input may include a dollar
//! sign and commas, the remote API exchanges plain JSON numbers.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::de::{Error as DeError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, Neg};
use std::str::FromStr;

/// Represents a dollar amount.
///
/// Equality and ordering are numeric, so `Amount::from_str("30")` equals
/// `Amount::from_str("$30.00")`.
///
/// # Examples
///
/// ```
/// # use fintrack::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("-$1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "-$1,250.50");
/// assert_eq!(amount.fixed(), "-1250.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the amount is less than zero.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Amount {
        Amount(self.0.abs())
    }

    /// The value with exactly two decimal places and no dollar sign or commas, e.g. `1950.00`.
    pub fn fixed(&self) -> String {
        format!("{:.2}", self.0.round_dp(2))
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError {
    input: String,
    source: rust_decimal::Error,
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.source, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid amount: {}", self.input, self.source)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        // "-$50.00", "$50.00", "-50.00" and "50.00" are all accepted
        let without_dollar = match trimmed.strip_prefix('-') {
            Some(after_minus) => match after_minus.strip_prefix('$') {
                Some(after_dollar) => format!("-{after_dollar}"),
                None => trimmed.to_string(),
            },
            None => trimmed.strip_prefix('$').unwrap_or(trimmed).to_string(),
        };

        // Remove commas (thousand separators)
        let without_commas = without_dollar.replace(',', "");

        let value = Decimal::from_str(&without_commas).map_err(|source| AmountError {
            input: s.to_string(),
            source,
        })?;
        Ok(Amount(value))
    }
}

impl Display for Amount {
    /// Formats as dollars with thousands separators, e.g. `-$60,000.00`.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let num = self.0.abs().to_f64().unwrap_or_default();
        write!(f, "{sign}${}", format_num::format_num!(",.2", num))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // The remote API stores amounts as JSON numbers.
        serializer.serialize_f64(self.0.to_f64().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a string containing a number")
    }

    fn visit_i64<E: DeError>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_u64<E: DeError>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_f64<E: DeError>(self, v: f64) -> Result<Amount, E> {
        Decimal::from_f64(v)
            .map(Amount)
            .ok_or_else(|| E::custom(format!("{v} cannot be represented as an amount")))
    }

    fn visit_str<E: DeError>(self, v: &str) -> Result<Amount, E> {
        Amount::from_str(v).map_err(E::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<i32> for Amount {
    fn from(value: i32) -> Self {
        Amount(Decimal::from(value))
    }
}

/// Saturates at `Decimal::MAX` and `Decimal::MIN` instead of overflowing.
impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}
