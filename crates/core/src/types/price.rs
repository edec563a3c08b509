//! Type-safe price representation using decimal arithmetic.
//!
//! The backend sends prices as JSON numbers (`199`, `24.5`) and sometimes as
//! numeric strings (`"299.00"`). Both deserialize into a [`Price`]. Prices are
//! always serialized as JSON numbers, which is what the backend expects in
//! request bodies.

use std::iter::Sum;
use std::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a price typed into a form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The input was empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input was not a decimal number.
    #[error("'{0}' is not a valid price")]
    Invalid(String),
    /// The input was below zero.
    #[error("price cannot be negative")]
    Negative,
}

/// A USD amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(serialize_with = "rust_decimal::serde::float::serialize")] Decimal);

impl Price {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of dollars.
    #[must_use]
    pub fn from_dollars(dollars: i64) -> Self {
        Self(Decimal::from(dollars))
    }

    /// Create a price from cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Format for display, e.g. `$19.99`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("${:.2}", self.0.round_dp(2))
    }

    /// Parse a price typed by a person (`"19.99"`, `"$19.99"`, `" 20 "`).
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not a number, or negative.
    pub fn parse_input(input: &str) -> Result<Self, PriceError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
        if trimmed.is_empty() {
            return Err(PriceError::Empty);
        }
        let amount: Decimal = trimmed
            .parse()
            .map_err(|_| PriceError::Invalid(input.trim().to_string()))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_number_and_string() {
        let from_int: Price = serde_json::from_str("199").unwrap();
        let from_float: Price = serde_json::from_str("24.5").unwrap();
        let from_str: Price = serde_json::from_str("\"299.00\"").unwrap();
        assert_eq!(from_int.display(), "$199.00");
        assert_eq!(from_float.display(), "$24.50");
        assert_eq!(from_str.display(), "$299.00");
    }

    #[test]
    fn test_serializes_as_number() {
        let price = Price::from_cents(1999);
        assert_eq!(serde_json::to_string(&price).unwrap(), "19.99");
    }

    #[test]
    fn test_line_total() {
        let price = Price::from_cents(1250);
        assert_eq!(price.line_total(3).display(), "$37.50");
        assert!(price.line_total(0).is_zero());
    }

    #[test]
    fn test_sum_and_add() {
        let total: Price = [Price::from_dollars(10), Price::from_cents(599)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(1599));
        assert_eq!(
            Price::from_dollars(1) + Price::from_dollars(2),
            Price::from_dollars(3)
        );
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(Price::parse_input("19.99").unwrap(), Price::from_cents(1999));
        assert_eq!(Price::parse_input(" $20 ").unwrap(), Price::from_dollars(20));
        assert_eq!(Price::parse_input("0").unwrap(), Price::ZERO);
        assert_eq!(Price::parse_input("  "), Err(PriceError::Empty));
        assert_eq!(Price::parse_input("-1"), Err(PriceError::Negative));
        assert!(matches!(
            Price::parse_input("abc"),
            Err(PriceError::Invalid(_))
        ));
    }

    #[test]
    fn test_display_rounds_to_cents() {
        let price = Price::new(Decimal::new(10_005, 3));
        assert_eq!(price.to_string(), "$10.00");
    }
}
