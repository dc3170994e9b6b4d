//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount could not be parsed as a decimal number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// The amount is zero or negative.
    #[error("amount must be greater than zero")]
    NotPositive,
    /// The currency code is not one we sell in.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    /// The amount does not fit in the payment provider's minor units.
    #[error("amount out of range")]
    OutOfRange,
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., euros, not cents).
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

    /// Parse a user-entered amount (accepts `9.90` and `9,90`).
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not a positive decimal.
    pub fn parse(amount: &str, currency_code: CurrencyCode) -> Result<Self, PriceError> {
        let normalized = amount.trim().replace(',', ".");
        let amount = Decimal::from_str(&normalized)
            .map_err(|_| PriceError::InvalidAmount(amount.trim().to_owned()))?;
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        Ok(Self::new(amount.round_dp(2), currency_code))
    }

    /// Amount in minor units (cents), rounded half away from zero.
    ///
    /// This is the `unit_amount` Stripe expects.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::OutOfRange` if the amount overflows `i64`.
    pub fn minor_units(&self) -> Result<i64, PriceError> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(PriceError::OutOfRange)
    }

    /// Format for display the way the storefront's Spanish locale does
    /// (e.g. `9,90 €`).
    #[must_use]
    pub fn display(&self) -> String {
        let fixed = format!("{:.2}", self.amount.round_dp(2));
        format!("{} {}", fixed.replace('.', ","), self.currency_code.symbol())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes supported by the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    EUR,
    USD,
    GBP,
    BRL,
    MXN,
}

impl CurrencyCode {
    /// All supported currencies, in the order the admin form lists them.
    pub const ALL: [Self; 5] = [Self::EUR, Self::USD, Self::GBP, Self::BRL, Self::MXN];

    /// Upper-case ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EUR => "EUR",
            Self::USD => "USD",
            Self::GBP => "GBP",
            Self::BRL => "BRL",
            Self::MXN => "MXN",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::EUR => "€",
            Self::USD => "US$",
            Self::GBP => "£",
            Self::BRL => "R$",
            Self::MXN => "MX$",
        }
    }

    /// Lower-case code as used by the Stripe API.
    #[must_use]
    pub fn stripe_code(&self) -> String {
        self.code().to_ascii_lowercase()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| PriceError::UnsupportedCurrency(s.trim().to_owned()))
    }
}
