//! Fixed-point currency amounts.
//!
//! Amounts are stored as whole cents so that sums over many transactions are
//! exact. On the wire an amount is a plain decimal number, e.g. `12.5`.

use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// An amount of money in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// No money.
    pub const ZERO: Money = Money(0);

    /// The largest amount accepted from a client, one hundred billion dollars.
    ///
    /// Totals over close to a million such amounts still fit in an `i64`.
    pub const MAX: Money = Money(10_000_000_000_000);

    /// Create an amount from a number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create an amount from a decimal number of dollars, rounding to the
    /// nearest cent.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if `amount` is not finite or its size
    /// is larger than [Money::MAX].
    pub fn from_decimal(amount: f64) -> Result<Self, Error> {
        let cents = (amount * 100.0).round();

        if !cents.is_finite() || cents.abs() > Self::MAX.0 as f64 {
            return Err(Error::InvalidAmount(amount.to_string()));
        }

        Ok(Self(cents as i64))
    }

    /// The amount in cents.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// The amount as a decimal number of dollars.
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Whether the amount is below zero.
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();

        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

// Arithmetic saturates at the bounds of `i64` instead of panicking.
impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Whole amounts are written as integers so that e.g. 5000 does not
        // come out as 5000.0.
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.as_decimal())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let amount = f64::deserialize(deserializer)?;
        Money::from_decimal(amount).map_err(serde::de::Error::custom)
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Money)
    }
}
