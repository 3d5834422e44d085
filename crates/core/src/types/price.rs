//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in Brazilian reais.
    #[must_use]
    pub const fn brl(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::BRL)
    }

    /// A zero price in Brazilian reais.
    #[must_use]
    pub const fn zero() -> Self {
        Self::brl(Decimal::ZERO)
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Price {
    /// Formats using Brazilian conventions: `R$ 1.234,56`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let text = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        write!(
            f,
            "{sign}{} {grouped},{frac_part}",
            self.currency_code.symbol()
        )
    }
}

/// ISO 4217 currency codes accepted by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::BRL => "R$",
            Self::USD => "US$",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display_groups_thousands() {
        let price = Price::brl(Decimal::new(123_456, 2));
        assert_eq!(price.to_string(), "R$ 1.234,56");
    }

    #[test]
    fn test_price_display_small_amounts() {
        assert_eq!(Price::brl(Decimal::new(5, 1)).to_string(), "R$ 0,50");
        assert_eq!(Price::zero().to_string(), "R$ 0,00");
    }

    #[test]
    fn test_price_display_rounds_half_up() {
        assert_eq!(Price::brl(Decimal::new(19_995, 3)).to_string(), "R$ 20,00");
    }

    #[test]
    fn test_negative_price() {
        assert_eq!(Price::brl(Decimal::new(-1_000_000, 2)).to_string(), "-R$ 10.000,00");
    }
}
