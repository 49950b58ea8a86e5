//! Fixed-point amounts
//!
//! Amounts are stored as signed micro-units so that arithmetic is exact and
//! hashing is stable. Negative values are representable on purpose: parsing
//! never rejects a number, validation does.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Micro-units per whole unit (6 decimal places)
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// A decimal amount with 6 fractional digits
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(from = "f64", into = "f64")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create from raw micro-units
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Create from whole units
    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(MICROS_PER_UNIT))
    }

    /// Raw micro-units
    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT as f64
    }
}

impl From<f64> for Amount {
    /// Rounds to the nearest micro-unit. Non-finite input saturates
    /// (NaN becomes zero) and is rejected later as non-positive or
    /// overflowing.
    fn from(value: f64) -> Self {
        Self((value * MICROS_PER_UNIT as f64).round() as i64)
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> Self {
        amount.to_f64()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MICROS_PER_UNIT as u64;
        let frac = abs % MICROS_PER_UNIT as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let digits = format!("{:06}", frac);
            write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
        }
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.map(|a| a.0).sum())
    }
}
