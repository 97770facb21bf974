//! # Money and Currency
//!
//! Currency allow-list and decimal → minor-unit conversion for gateway amounts.
//! Amounts travel as decimal strings until they are handed to the gateway;
//! floating point is never involved.

use crate::error::{ErrorCode, PaymentError, PaymentResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    CNY,
    SEK,
    NZD,
}

impl Currency {
    pub const ALL: [Currency; 10] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::JPY,
        Currency::CAD,
        Currency::AUD,
        Currency::CHF,
        Currency::CNY,
        Currency::SEK,
        Currency::NZD,
    ];

    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::CHF => "CHF",
            Currency::CNY => "CNY",
            Currency::SEK => "SEK",
            Currency::NZD => "NZD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| {
                PaymentError::new(
                    ErrorCode::InvalidCurrency,
                    format!("unsupported currency: {code}"),
                )
            })
    }
}

/// Membership test against the fixed allow-list.
pub fn is_supported_currency(code: &str) -> bool {
    code.parse::<Currency>().is_ok()
}

/// Parse a decimal amount string.
pub fn parse_amount(amount: &str) -> PaymentResult<Decimal> {
    Decimal::from_str(amount.trim()).map_err(|e| {
        PaymentError::new(ErrorCode::InvalidAmount, format!("invalid amount: {amount}"))
            .with_source(e)
    })
}

/// Scale an already-parsed amount to minor units (×100), rounding half away
/// from zero so sub-cent remainders never underbill.
pub fn decimal_to_minor_units(amount: Decimal) -> PaymentResult<i64> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::new(
            ErrorCode::InvalidAmount,
            format!("amount must be positive, got: {amount}"),
        ));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_i64())
        .ok_or_else(|| {
            PaymentError::new(
                ErrorCode::InvalidAmount,
                format!("amount out of range: {amount}"),
            )
        })
}

/// Convert a decimal amount string to the gateway's minor-unit integer.
pub fn to_minor_units(amount: &str) -> PaymentResult<i64> {
    decimal_to_minor_units(parse_amount(amount)?)
}
