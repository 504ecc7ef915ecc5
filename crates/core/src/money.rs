//! Monetary amounts in integer minor units.
//!
//! Amounts are stored as cents (`i64`). Arithmetic that involves percentages
//! is carried out in `rust_decimal::Decimal` by the caller and converted back
//! exactly once through [`Money::from_decimal_rounded`], which rounds half-up
//! to two fractional digits. Externally an amount is a decimal string with two
//! fractional digits (`"232.00"`).

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits in the external representation.
pub const MINOR_DIGITS: u32 = 2;

/// A monetary amount in minor units (cents).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units (e.g. `from_major(100)` is `100.00`).
    pub const fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Exact conversion; rejects amounts with more than two fractional digits.
    pub fn from_decimal(value: Decimal) -> DomainResult<Self> {
        if value.normalize().scale() > MINOR_DIGITS {
            return Err(DomainError::validation(format!(
                "amount {value} has more than {MINOR_DIGITS} fractional digits"
            )));
        }
        value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Self)
            .ok_or_else(|| DomainError::validation(format!("amount {value} is out of range")))
    }

    /// Round half-up to cents. Saturates at the `i64` bounds.
    pub fn from_decimal_rounded(value: Decimal) -> Self {
        let rounded =
            value.round_dp_with_strategy(MINOR_DIGITS, RoundingStrategy::MidpointAwayFromZero);
        match rounded.checked_mul(Decimal::ONE_HUNDRED).and_then(|c| c.to_i64()) {
            Some(c) => Self(c),
            None if rounded.is_sign_negative() => Self(i64::MIN),
            None => Self(i64::MAX),
        }
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_DIGITS)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_decimal(), f)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(value).map_err(serde::de::Error::custom)
    }
}
