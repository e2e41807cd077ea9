//! # Money — Integer Minor-Unit Currency
//!
//! Every amount in FlexSave is a [`Money`]: a `u64` count of cents. Nothing
//! in the policy engine divides floats. The ledger API speaks JSON numbers,
//! so conversion to and from `f64` happens exactly once, in the serde impls
//! below, and rounds to the nearest cent.
//!
//! ## Parsing
//!
//! User input accepts both decimal separators because the product is used
//! in French: `"12"`, `"12.5"`, `"12.50"`, `"12,50"` are all twelve euros
//! fifty. More than two fraction digits is rejected rather than rounded.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{AMOUNT_DECIMALS, BPS_DENOMINATOR, MAX_PERCENTAGE, MINOR_UNITS_PER_MAJOR};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced when building a [`Money`] or [`Percent`] from outside input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The input was empty or only whitespace.
    #[error("amount is empty")]
    Empty,

    /// The input was a negative number.
    #[error("amount must not be negative")]
    Negative,

    /// The input is not a decimal number.
    #[error("'{input}' is not a valid amount")]
    Malformed {
        /// The offending input, trimmed.
        input: String,
    },

    /// More fraction digits than the currency has.
    #[error("amount has more than {max} decimal places")]
    TooManyDecimals {
        /// Maximum number of fraction digits.
        max: usize,
    },

    /// The amount does not fit in a `u64` of cents.
    #[error("amount is too large")]
    Overflow,

    /// A float from the wire was NaN or infinite.
    #[error("amount is not a finite number")]
    NotFinite,

    /// A percentage outside 0..=100.
    #[error("percentage {value} is outside 0..=100")]
    PercentOutOfRange {
        /// The rejected value.
        value: i64,
    },
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A non-negative amount of euros, stored as cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero cents.
    pub const ZERO: Money = Money(0);

    /// Builds an amount from a count of cents.
    pub const fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    /// Builds an amount from whole euros. Returns `None` on overflow.
    pub fn from_major(units: u64) -> Option<Self> {
        units.checked_mul(MINOR_UNITS_PER_MAJOR).map(Money)
    }

    /// The amount in cents.
    pub const fn cents(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// `self * pct / 100`, rounded down to the cent.
    ///
    /// Used for allowance ceilings, where rounding up would grant money
    /// the user does not have.
    pub fn percent_floor(self, pct: Percent) -> Money {
        let scaled = u128::from(self.0) * u128::from(pct.value()) / 100;
        // pct <= 100 so the result never exceeds self.
        Money(scaled as u64)
    }

    /// `self * bps / 10_000`, rounded half-up to the cent.
    ///
    /// Fees use this: 1% of 0.50 is 0.005, charged as 0.01.
    pub fn apply_bps(self, bps: u32) -> Money {
        let denom = u128::from(BPS_DENOMINATOR);
        let scaled = (u128::from(self.0) * u128::from(bps) + denom / 2) / denom;
        Money(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    /// Parses a user-typed decimal amount. See the module docs for accepted
    /// forms.
    pub fn parse(input: &str) -> Result<Money, MoneyError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }
        if s.starts_with('-') {
            return Err(MoneyError::Negative);
        }
        let malformed = || MoneyError::Malformed {
            input: s.to_string(),
        };

        let (whole, frac) = match s.find(['.', ',']) {
            Some(i) => (&s[..i], Some(&s[i + 1..])),
            None => (s, None),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let whole: u64 = whole.parse().map_err(|_| MoneyError::Overflow)?;

        let frac_cents = match frac {
            None => 0,
            Some(f) => {
                if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                if f.len() > AMOUNT_DECIMALS {
                    return Err(MoneyError::TooManyDecimals {
                        max: AMOUNT_DECIMALS,
                    });
                }
                let digits: u64 = f.parse().map_err(|_| malformed())?;
                if f.len() == 1 {
                    digits * 10
                } else {
                    digits
                }
            }
        };

        whole
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|c| c.checked_add(frac_cents))
            .map(Money)
            .ok_or(MoneyError::Overflow)
    }

    /// Converts a JSON number from the ledger into cents, rounding to the
    /// nearest cent.
    pub fn from_f64(value: f64) -> Result<Money, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        if value < 0.0 {
            return Err(MoneyError::Negative);
        }
        let cents = (value * MINOR_UNITS_PER_MAJOR as f64).round();
        if cents >= u64::MAX as f64 {
            return Err(MoneyError::Overflow);
        }
        Ok(Money(cents as u64))
    }

    /// The amount as a JSON number for the ledger.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MINOR_UNITS_PER_MAJOR as f64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_UNITS_PER_MAJOR,
            self.0 % MINOR_UNITS_PER_MAJOR
        )
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl<'de> Visitor<'de> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative amount as a number or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                Money::from_major(v).ok_or_else(|| E::custom(MoneyError::Overflow))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                let v = u64::try_from(v).map_err(|_| E::custom(MoneyError::Negative))?;
                self.visit_u64(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                Money::from_f64(v).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                Money::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

// ---------------------------------------------------------------------------
// Percent
// ---------------------------------------------------------------------------

/// A whole percentage in 0..=100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(MAX_PERCENTAGE);

    pub fn new(value: u8) -> Result<Self, MoneyError> {
        if value > MAX_PERCENTAGE {
            return Err(MoneyError::PercentOutOfRange {
                value: i64::from(value),
            });
        }
        Ok(Percent(value))
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PercentVisitor;

        impl<'de> Visitor<'de> for PercentVisitor {
            type Value = Percent;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a percentage between 0 and 100")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Percent, E> {
                let value = i64::try_from(v).unwrap_or(i64::MAX);
                u8::try_from(v)
                    .map_err(|_| MoneyError::PercentOutOfRange { value })
                    .and_then(Percent::new)
                    .map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Percent, E> {
                let v = u64::try_from(v)
                    .map_err(|_| E::custom(MoneyError::PercentOutOfRange { value: v }))?;
                self.visit_u64(v)
            }

            // The backend stores percentages as floats (10.0, sometimes 7.5).
            // Fractions are floored, which can only shrink an allowance.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Percent, E> {
                if !v.is_finite() || v < 0.0 || v > f64::from(MAX_PERCENTAGE) {
                    return Err(E::custom(format!("percentage {v} is outside 0..=100")));
                }
                let whole = v.floor();
                if whole != v {
                    tracing::warn!(
                        percentage = v,
                        floored = whole,
                        "fractional percentage floored"
                    );
                }
                self.visit_u64(whole as u64)
            }
        }

        deserializer.deserialize_any(PercentVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_forms() {
        assert_eq!(Money::parse("12").unwrap(), Money::from_cents(1200));
        assert_eq!(Money::parse("12.5").unwrap(), Money::from_cents(1250));
        assert_eq!(Money::parse("12.34").unwrap(), Money::from_cents(1234));
        assert_eq!(Money::parse("12,34").unwrap(), Money::from_cents(1234));
        assert_eq!(Money::parse("  0.07 ").unwrap(), Money::from_cents(7));
        assert_eq!(Money::parse("0").unwrap(), Money::ZERO);
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(Money::parse("   "), Err(MoneyError::Empty));
        assert_eq!(Money::parse("-3"), Err(MoneyError::Negative));
        assert_eq!(
            Money::parse("1.234"),
            Err(MoneyError::TooManyDecimals { max: 2 })
        );
        assert!(matches!(
            Money::parse("abc"),
            Err(MoneyError::Malformed { .. })
        ));
        assert!(matches!(
            Money::parse("12."),
            Err(MoneyError::Malformed { .. })
        ));
        assert!(matches!(
            Money::parse(".5"),
            Err(MoneyError::Malformed { .. })
        ));
        assert!(matches!(
            Money::parse("1.2.3"),
            Err(MoneyError::Malformed { .. })
        ));
        assert_eq!(
            Money::parse("999999999999999999999"),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_display_two_digits() {
        assert_eq!(Money::from_cents(3960).to_string(), "39.60");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_apply_bps_rounds_half_up() {
        // 1% of 40.00
        assert_eq!(Money::from_cents(4000).apply_bps(100), Money::from_cents(40));
        // 1% of 0.50 = 0.005 -> 0.01
        assert_eq!(Money::from_cents(50).apply_bps(100), Money::from_cents(1));
        // 1% of 0.49 = 0.0049 -> 0.00
        assert_eq!(Money::from_cents(49).apply_bps(100), Money::ZERO);
        // 0.5% of 10.00
        assert_eq!(Money::from_cents(1000).apply_bps(50), Money::from_cents(5));
        assert_eq!(Money::from_cents(u64::MAX).apply_bps(0), Money::ZERO);
    }

    #[test]
    fn test_percent_floor() {
        let p10 = Percent::new(10).unwrap();
        assert_eq!(Money::from_cents(100_000).percent_floor(p10), Money::from_cents(10_000));
        assert_eq!(Money::from_cents(999).percent_floor(p10), Money::from_cents(99));
        assert_eq!(
            Money::from_cents(u64::MAX).percent_floor(Percent::HUNDRED),
            Money::from_cents(u64::MAX)
        );
    }

    #[test]
    fn test_float_boundary() {
        assert_eq!(Money::from_f64(39.6).unwrap(), Money::from_cents(3960));
        assert_eq!(Money::from_f64(0.1 + 0.2).unwrap(), Money::from_cents(30));
        assert_eq!(Money::from_f64(-0.01), Err(MoneyError::Negative));
        assert_eq!(Money::from_f64(f64::NAN), Err(MoneyError::NotFinite));
        assert_eq!(Money::from_cents(1234).to_f64(), 12.34);
    }

    #[test]
    fn test_json_decoding_variants() {
        let from_float: Money = serde_json::from_str("1000.5").unwrap();
        let from_int: Money = serde_json::from_str("1000").unwrap();
        let from_str: Money = serde_json::from_str("\"1000,50\"").unwrap();
        assert_eq!(from_float, Money::from_cents(100_050));
        assert_eq!(from_int, Money::from_cents(100_000));
        assert_eq!(from_str, from_float);
        assert!(serde_json::from_str::<Money>("-1").is_err());
        assert_eq!(serde_json::to_string(&Money::from_cents(3960)).unwrap(), "39.6");
    }

    #[test]
    fn test_percent_bounds_and_decoding() {
        assert!(Percent::new(101).is_err());
        assert_eq!(Percent::new(10).unwrap().to_string(), "10%");
        let p: Percent = serde_json::from_str("10.0").unwrap();
        assert_eq!(p.value(), 10);
        let p: Percent = serde_json::from_str("7.5").unwrap();
        assert_eq!(p.value(), 7);
        let p: Percent = serde_json::from_str("99.99").unwrap();
        assert_eq!(p.value(), 99);
        assert!(serde_json::from_str::<Percent>("100.5").is_err());
        assert!(serde_json::from_str::<Percent>("250").is_err());
        assert!(serde_json::from_str::<Percent>("-1").is_err());
    }
}
