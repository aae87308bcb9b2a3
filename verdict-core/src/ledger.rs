//! # Ledger Primitives
//!
//! Accounting types shared by every component: identities, native-value amounts,
//! share counts, basis-point fees and the outcome/direction enums.

use crate::{error::Result, MarketError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native value units (wei-like). One ether is `10^18` units.
pub type Amount = u128;

/// Number of shares held on one side of a market.
pub type Shares = u128;

/// Sequential market identifier.
pub type MarketId = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// One ether-equivalent in native value units.
pub const ONE_ETHER: Amount = 1_000_000_000_000_000_000;

/// 10000 basis points = 100%.
pub const BASIS_POINTS: u32 = 10_000;

/// Upper bound for both the platform fee and any creator fee (5%).
pub const MAX_FEE_BPS: u32 = 500;

/// Exact bond a resolver must attach to `stake`.
pub const RESOLVER_STAKE_AMOUNT: Amount = ONE_ETHER / 2;

/// An already-authenticated actor identity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address from any string-like identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The empty identity, used as "unset".
    pub fn is_zero(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject the empty identity.
    pub fn require_nonzero(&self) -> Result<&Self> {
        if self.is_zero() {
            return Err(MarketError::InvalidAddress(
                "address must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Address {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Fee expressed in basis points.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// Build a fee, rejecting anything above [`MAX_FEE_BPS`].
    pub fn new(bps: u32) -> Result<Self> {
        if bps > MAX_FEE_BPS {
            return Err(MarketError::FeeTooHigh {
                fee: bps,
                max: MAX_FEE_BPS,
            });
        }
        Ok(Self(bps))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// `amount * bps / BASIS_POINTS`, rounded down.
    pub fn apply(self, amount: Amount) -> Result<Amount> {
        amount
            .checked_mul(Amount::from(self.0))
            .map(|scaled| scaled / Amount::from(BASIS_POINTS))
            .ok_or(MarketError::Overflow)
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Side of a market a bettor buys into.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Yes,
    No,
}

/// Market result, also used as a resolver's vote choice.
///
/// `None` is the "unresolved" sentinel: it is the result of every market that has
/// not been resolved and is never an acceptable vote.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    #[default]
    None,
    Yes,
    No,
    Invalid,
}

impl Outcome {
    /// The betting side that wins under this outcome, if any.
    pub fn winning_direction(self) -> Option<Direction> {
        match self {
            Outcome::Yes => Some(Direction::Yes),
            Outcome::No => Some(Direction::No),
            Outcome::None | Outcome::Invalid => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::None => "None",
            Outcome::Yes => "Yes",
            Outcome::No => "No",
            Outcome::Invalid => "Invalid",
        };
        f.write_str(label)
    }
}

/// `shares * price`, checked.
pub fn share_value(shares: Shares, price: Amount) -> Result<Amount> {
    shares.checked_mul(price).ok_or(MarketError::Overflow)
}

/// Convert native units to a display value in ether.
pub fn units_to_ether(units: Amount) -> f64 {
    units as f64 / ONE_ETHER as f64
}

/// Convert an ether amount to native units, truncating below one unit.
pub fn ether_to_units(ether: f64) -> Amount {
    (ether * ONE_ETHER as f64) as Amount
}
