//! Type-safe price representation.
//!
//! Prices are stored and moved around as integer minor units (cents for USD)
//! so that arithmetic on them is exact. Conversion to a decimal amount only
//! happens at the edges, for display.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unit or total price in minor currency units.
///
/// Serializes as a bare integer, matching the `BIGINT` columns it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(0);

    /// Create a price from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Get the amount in minor units.
    #[must_use]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Get the amount in the currency's standard unit (e.g., dollars, not cents).
    #[must_use]
    pub fn amount(&self, currency: CurrencyCode) -> Decimal {
        Decimal::new(self.0, currency.minor_digits())
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> String {
        format!("{}{}", currency.symbol(), self.amount(currency))
    }
}

impl From<i64> for Price {
    fn from(minor: i64) -> Self {
        Self(minor)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    IDR,
    JPY,
}

impl CurrencyCode {
    /// Currency symbol used when formatting prices.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::IDR => "Rp",
            Self::JPY => "¥",
        }
    }

    /// Number of decimal digits in one major unit.
    #[must_use]
    pub const fn minor_digits(&self) -> u32 {
        match self {
            Self::USD | Self::EUR | Self::GBP | Self::IDR => 2,
            Self::JPY => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_uses_minor_digits() {
        let price = Price::from_minor(1999);
        assert_eq!(price.amount(CurrencyCode::USD).to_string(), "19.99");
        assert_eq!(price.amount(CurrencyCode::JPY).to_string(), "1999");
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_minor(500).display(CurrencyCode::USD), "$5.00");
        assert_eq!(Price::ZERO.display(CurrencyCode::GBP), "£0.00");
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Price::from_minor(12_500)).unwrap_or_default();
        assert_eq!(json, "12500");
    }
}
