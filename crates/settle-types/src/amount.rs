//! Integer amounts and rational prices.
//!
//! Amounts are counted in minor units of an asset (its `scale` tells clients
//! where to put the decimal point). They are backed by [`Decimal`], so they
//! are always whole and never negative and range up to [`Amount::MAX`]
//! (`2^96 - 1`, 28 to 29 digits). Larger values are refused when parsed.
//! Arithmetic is checked; overflow surfaces as an `internal_error` instead of
//! wrapping.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Result, SettleError};

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Non-negative whole quantity of an asset, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);
    /// Largest representable amount, `2^96 - 1`.
    pub const MAX: Self = Self(Decimal::MAX);

    /// Validate a decimal as an amount: whole and non-negative.
    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(SettleError::invalid(format!("negative amount: {value}")));
        }
        if !value.fract().is_zero() {
            return Err(SettleError::invalid(format!("fractional amount: {value}")));
        }
        Ok(Self(value.trunc().normalize()))
    }

    #[must_use]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// `None` when the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(|d| Self(d.normalize()))
    }

    /// Addition that reports overflow as [`SettleError::Internal`].
    pub fn try_add(self, other: Self) -> Result<Self> {
        self.checked_add(other)
            .ok_or_else(|| SettleError::Internal(format!("amount overflow: {self} + {other}")))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(Decimal::from(v))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SettleError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(a: Amount) -> Self {
        a.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self> {
        let d = Decimal::from_str(s)
            .map_err(|e| SettleError::invalid(format!("bad amount {s:?}: {e}")))?;
        Self::new(d)
    }
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Rational exchange rate `numerator/denominator` of an offer.
///
/// For an offer on `A/B` a price `n/d` means the owner hands out `d` units of
/// `A` for every `n` units of `B` it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Price {
    numerator: Amount,
    denominator: Amount,
}

impl Price {
    pub fn new(numerator: Amount, denominator: Amount) -> Result<Self> {
        if numerator.is_zero() || denominator.is_zero() {
            return Err(SettleError::invalid(format!(
                "price terms must be positive: {numerator}/{denominator}"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    #[must_use]
    pub fn numerator(&self) -> Amount {
        self.numerator
    }

    #[must_use]
    pub fn denominator(&self) -> Amount {
        self.denominator
    }

    /// Units of the offer's base asset paid out for `quote_in` units of its
    /// quote asset, rounded down.
    pub fn apply(&self, quote_in: Amount) -> Result<Amount> {
        let n = self.numerator.0;
        let product = quote_in
            .0
            .checked_mul(self.denominator.0)
            .ok_or_else(|| SettleError::Internal(format!("price overflow: {quote_in} * {self}")))?;
        let remainder = product
            .checked_rem(n)
            .ok_or_else(|| SettleError::Internal(format!("price remainder failed: {self}")))?;
        let whole = (product - remainder)
            .checked_div(n)
            .ok_or_else(|| SettleError::Internal(format!("price division failed: {self}")))?;
        Amount::new(whole)
    }

    /// Orders prices so that the one paying out the most base per unit of
    /// quote comes first.
    #[must_use]
    pub fn cmp_rate(&self, other: &Self) -> Ordering {
        let lhs = self.denominator.0.checked_mul(other.numerator.0);
        let rhs = other.denominator.0.checked_mul(self.numerator.0);
        match (lhs, rhs) {
            (Some(l), Some(r)) => r.cmp(&l),
            _ => {
                let l = self.denominator.0 / self.numerator.0;
                let r = other.denominator.0 / other.numerator.0;
                r.cmp(&l)
            }
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Price {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self> {
        let (n, d) = s
            .split_once('/')
            .ok_or_else(|| SettleError::invalid(format!("price without '/': {s}")))?;
        Self::new(n.trim().parse()?, d.trim().parse()?)
    }
}

impl TryFrom<String> for Price {
    type Error = SettleError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Price> for String {
    fn from(p: Price) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn price(s: &str) -> Price {
        s.parse().unwrap()
    }

    #[test]
    fn amount_rejects_negative_and_fractional() {
        assert!(Amount::new(Decimal::new(-1, 0)).is_err());
        assert!(Amount::new(Decimal::new(15, 1)).is_err());
        assert_eq!(Amount::new(Decimal::new(100, 1)).unwrap(), Amount::from(10u64));
        assert!("1.5".parse::<Amount>().is_err());
    }

    #[test]
    fn amount_checked_sub_never_negative() {
        let a = Amount::from(5u64);
        assert_eq!(a.checked_sub(Amount::from(5u64)), Some(Amount::ZERO));
        assert_eq!(a.checked_sub(Amount::from(6u64)), None);
    }

    #[test]
    fn amount_overflow_is_an_error() {
        let max = Amount::new(Decimal::MAX).unwrap();
        assert!(max.checked_add(Amount::from(1u64)).is_none());
        let err = max.try_add(Amount::from(1u64)).unwrap_err();
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn amount_serializes_as_string() {
        let json = serde_json::to_string(&Amount::from(42u64)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Amount = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(back, Amount::from(42u64));
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());
    }

    #[test]
    fn price_apply_rounds_down() {
        assert_eq!(price("100/100").apply(Amount::from(10u64)).unwrap(), Amount::from(10u64));
        assert_eq!(price("100/98").apply(Amount::from(10u64)).unwrap(), Amount::from(9u64));
        assert_eq!(price("3/1").apply(Amount::from(10u64)).unwrap(), Amount::from(3u64));
        assert_eq!(price("1/2").apply(Amount::from(7u64)).unwrap(), Amount::from(14u64));
    }

    #[test]
    fn price_rejects_zero_terms() {
        assert!("0/1".parse::<Price>().is_err());
        assert!("1/0".parse::<Price>().is_err());
        assert!("1".parse::<Price>().is_err());
    }

    #[test]
    fn price_overflow_is_an_error() {
        let p = Price::new(Amount::from(1u64), Amount::new(Decimal::MAX).unwrap()).unwrap();
        assert!(p.apply(Amount::from(2u64)).is_err());
    }

    #[test]
    fn amounts_beyond_the_bound_are_refused() {
        assert_eq!(Amount::MAX.to_string(), "79228162514264337593543950335");
        assert_eq!("79228162514264337593543950335".parse::<Amount>().unwrap(), Amount::MAX);
        let err = "79228162514264337593543950336".parse::<Amount>().unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    fn amount(v: u128) -> Amount {
        let d = Decimal::try_from_i128_with_scale(i128::try_from(v).unwrap(), 0).unwrap();
        Amount::new(d).unwrap()
    }

    proptest! {
        #[test]
        fn apply_is_exact_floor_or_overflows(
            q in 0u128..(1u128 << 96),
            n in 1u128..=u128::from(u32::MAX),
            d in 1u128..=u128::from(u32::MAX),
        ) {
            let p = Price::new(amount(n), amount(d)).unwrap();
            let product = q * d;
            match p.apply(amount(q)) {
                Ok(out) => {
                    prop_assert!(product < (1u128 << 96));
                    prop_assert_eq!(out, amount(product / n));
                }
                Err(err) => {
                    prop_assert!(product >= (1u128 << 96));
                    prop_assert_eq!(err.code(), "internal_error");
                }
            }
        }
    }

    #[test]
    fn better_rate_sorts_first() {
        let mut prices = vec![price("100/98"), price("1/2"), price("100/100")];
        prices.sort_by(Price::cmp_rate);
        assert_eq!(prices, vec![price("1/2"), price("100/100"), price("100/98")]);
    }
}
