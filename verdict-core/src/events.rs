//! Events emitted by engine operations.

use crate::ledger::{Address, Amount, Direction, MarketId, Outcome, Shares, Timestamp};
use crate::voting::Deferral;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketEvent {
    MarketCreated {
        market_id: MarketId,
        creator: Address,
        metadata_digest: String,
        start_time: Timestamp,
        end_time: Timestamp,
        creator_fee_bps: u32,
    },
    SharesBought {
        market_id: MarketId,
        buyer: Address,
        direction: Direction,
        shares: Shares,
        paid: Amount,
    },
    MarketClosed {
        market_id: MarketId,
    },
    ResolverStaked {
        resolver: Address,
        amount: Amount,
        staking_time: Timestamp,
    },
    ResolverUnstaked {
        resolver: Address,
        amount: Amount,
    },
    VoteCast {
        market_id: MarketId,
        resolver: Address,
        choice: Outcome,
    },
    FinalizationDeferred {
        market_id: MarketId,
        reason: Deferral,
    },
    MarketResolved {
        market_id: MarketId,
        outcome: Outcome,
    },
    WinningsClaimed {
        market_id: MarketId,
        claimant: Address,
        amount: Amount,
    },
    /// One transfer of the bulk distribution; `success == false` means forfeited
    PayoutDistributed {
        market_id: MarketId,
        recipient: Address,
        amount: Amount,
        success: bool,
    },
    FeePaid {
        market_id: MarketId,
        recipient: Address,
        amount: Amount,
        success: bool,
    },
    SharePriceUpdated {
        share_price: Amount,
    },
    PlatformFeeUpdated {
        fee_bps: u32,
    },
    PlatformAddressUpdated {
        platform_address: Address,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

impl MarketEvent {
    /// Market the event belongs to, if any.
    pub fn market_id(&self) -> Option<MarketId> {
        use MarketEvent::*;
        match self {
            MarketCreated { market_id, .. }
            | SharesBought { market_id, .. }
            | MarketClosed { market_id }
            | VoteCast { market_id, .. }
            | FinalizationDeferred { market_id, .. }
            | MarketResolved { market_id, .. }
            | WinningsClaimed { market_id, .. }
            | PayoutDistributed { market_id, .. }
            | FeePaid { market_id, .. } => Some(*market_id),
            _ => None,
        }
    }
}
