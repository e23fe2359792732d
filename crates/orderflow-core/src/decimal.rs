//! Precision-safe decimal types for simulated orders.
//!
//! Uses `rust_decimal` so displayed amounts and fiat totals never pick up
//! floating-point noise.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Crypto-side order amount (e.g. USDT).
///
/// Wraps `Decimal` so amounts are never mixed up with rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Build an amount, rejecting zero and negative values.
    pub fn positive(value: Decimal) -> Result<Self> {
        if value.is_sign_positive() && !value.is_zero() {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidAmount(value.to_string()))
        }
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Fiat value of this amount at `rate`, rounded to cents.
    #[inline]
    pub fn fiat_value(&self, rate: Rate) -> Decimal {
        (self.0 * rate.0).round_dp(2)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Amount {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Exchange rate: fiat units per crypto unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(pub Decimal);

impl Rate {
    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Build a rate, rejecting zero and negative values.
    pub fn positive(value: Decimal) -> Result<Self> {
        if value.is_sign_positive() && !value.is_zero() {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidRate(value.to_string()))
        }
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Shift this rate by `bps` basis points.
    #[inline]
    pub fn shifted_bps(&self, bps: i64) -> Self {
        Self(self.0 * (Decimal::from(10_000 + bps) / Decimal::from(10_000)))
    }

    /// Basis points difference from another rate.
    #[inline]
    pub fn bps_from(&self, other: Rate) -> Option<Decimal> {
        if other.0.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::from(10_000))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Rate {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Mul<Decimal> for Rate {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive_rejects_zero_and_negative() {
        assert!(Amount::positive(dec!(5000)).is_ok());
        assert!(matches!(
            Amount::positive(dec!(0)),
            Err(CoreError::InvalidAmount(_))
        ));
        assert!(Amount::positive(dec!(-1)).is_err());
    }

    #[test]
    fn test_rate_positive_rejects_zero() {
        assert!(Rate::positive(dec!(3.67)).is_ok());
        assert!(matches!(Rate::positive(dec!(0)), Err(CoreError::InvalidRate(_))));
    }

    #[test]
    fn test_fiat_value() {
        let amount = Amount::new(dec!(5000));
        let rate = Rate::new(dec!(3.6725));
        assert_eq!(amount.fiat_value(rate), dec!(18362.50));
    }

    #[test]
    fn test_rate_shift_and_bps() {
        let base = Rate::new(dec!(100));
        let up = base.shifted_bps(200);
        assert_eq!(up.inner(), dec!(102));
        assert_eq!(up.bps_from(base).unwrap(), dec!(200));
    }
}
