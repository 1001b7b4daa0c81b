use crate::error::VoteError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A price in major currency units (cedis), e.g. the cost of one vote.
///
/// Wraps `rust_decimal::Decimal` so prices never go through floating point and
/// can only be constructed positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub fn new(value: Decimal) -> Result<Self, VoteError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(VoteError::Validation("Price must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Total price of `votes` units at this price.
    pub fn times(&self, votes: VoteCount) -> Money {
        Self(self.0 * Decimal::from(votes.get()))
    }

    /// Converts to the gateway's minor unit (pesewas), rounding half-even to a whole unit.
    pub fn to_minor_units(&self) -> Result<u64, VoteError> {
        (self.0 * dec!(100)).round().to_u64().ok_or_else(|| {
            VoteError::Validation(format!("Amount {} is out of range", self.0))
        })
    }
}

impl TryFrom<Decimal> for Money {
    type Error = VoteError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A strictly positive number of votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct VoteCount(u32);

impl VoteCount {
    pub fn new(value: u32) -> Result<Self, VoteError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(VoteError::Validation(
                "Vote count must be at least 1".to_string(),
            ))
        }
    }

    /// Parses free-form user input. Anything but a positive integer is rejected.
    pub fn parse(input: &str) -> Option<Self> {
        input
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|value| Self::new(value).ok())
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for VoteCount {
    type Error = VoteError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VoteCount> for u32 {
    fn from(count: VoteCount) -> Self {
        count.0
    }
}

impl From<VoteCount> for u64 {
    fn from(count: VoteCount) -> Self {
        u64::from(count.0)
    }
}

impl fmt::Display for VoteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
