//! # Configuration
//!
//! [`EngineConfig`] is the construction-time configuration, loadable from JSON.
//! [`GlobalConfig`] is the validated runtime copy that only the owner can mutate.

use crate::{
    error::Result,
    ledger::{Address, Amount, BasisPoints, ONE_ETHER},
    MarketError,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction-time settings for an engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Holder of the privileged owner role
    pub owner: Address,
    /// Native value units per share
    pub share_price: Amount,
    /// Platform fee in basis points, at most 500
    pub platform_fee_bps: u32,
    /// Recipient of platform fees
    pub platform_address: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner: Address::from("owner"),
            share_price: ONE_ETHER / 100,
            platform_fee_bps: 50,
            platform_address: Address::from("platform"),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check every field and produce the runtime configuration.
    pub fn validate(&self) -> Result<GlobalConfig> {
        if self.share_price == 0 {
            return Err(MarketError::InvalidSharePrice);
        }
        self.owner.require_nonzero()?;
        self.platform_address.require_nonzero()?;
        Ok(GlobalConfig {
            owner: self.owner.clone(),
            share_price: self.share_price,
            platform_fee: BasisPoints::new(self.platform_fee_bps)?,
            platform_address: self.platform_address.clone(),
        })
    }
}

/// Process-wide parameters read by betting, finalization and payout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Only identity allowed to call the privileged setters
    pub owner: Address,
    /// Native value units per share, always non-zero
    pub share_price: Amount,
    /// Fee taken from each winning payout for the platform
    pub platform_fee: BasisPoints,
    /// Recipient of platform fees
    pub platform_address: Address,
}

impl GlobalConfig {
    /// Fail with `Unauthorized` unless `actor` is the owner.
    pub fn require_owner(&self, actor: &Address) -> Result<()> {
        if *actor != self.owner {
            return Err(MarketError::Unauthorized(actor.to_string()));
        }
        Ok(())
    }
}
