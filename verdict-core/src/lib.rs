//! # Verdict Core
//!
//! Core Rust library for binary prediction markets resolved by bonded resolvers.
//!
//! This library provides the building blocks of a market engine where:
//! - Anyone opens a Yes/No market with a betting window and an optional creator fee
//! - Bettors buy fixed-price shares on either side during the window
//! - Resolvers bond a fixed stake and vote on closed markets they were eligible for
//! - A quorum scaled to the money at risk, backed by enough bonded stake, finalizes the outcome
//! - The pool is split pari-mutuel among winners, or refunded when the market is voided
//!
//! ## Features
//!
//! - **Market Lifecycle**: Active, Closed and Resolved phases driven by wall-clock time
//! - **Resolver Staking**: Bonds that fix voting eligibility at market start
//! - **Tiered Quorum**: 2 to 7 votes depending on the value at stake
//! - **Payouts**: Strict per-user claims and tolerant bulk distribution with fees
//! - **Atomic Transactions**: Every value-moving call commits or rolls back as a whole
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use verdict_core::{Address, Direction, Engine, EngineConfig, InMemoryVault, ManualClock};
//!
//! let clock = ManualClock::new(1_735_689_000);
//! let mut engine = Engine::new(&EngineConfig::default(), InMemoryVault::new(), Arc::new(clock.clone()))?;
//!
//! let alice = Address::from("alice");
//! engine.vault_mut().fund(&alice, verdict_core::ONE_ETHER);
//!
//! let market = engine.open_market(&"creator".into(), "Will it rain?", 1_735_689_600, 1_735_693_200, 100)?;
//! clock.set(1_735_689_600);
//!
//! let price = engine.config().share_price;
//! engine.buy_shares(&alice, market, Direction::Yes, 2, 2 * price)?;
//! assert_eq!(engine.user_shares(market, &alice)?.yes_shares, 2);
//! Ok::<(), verdict_core::MarketError>(())
//! ```

pub mod betting;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod market;
pub mod payout;
pub mod registry;
pub mod shared;
pub mod vault;
pub mod voting;

#[cfg(test)]
pub mod test_utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, GlobalConfig};
pub use engine::{Engine, EngineSnapshot, MarketInfo};
pub use error::{ErrorKind, MarketError, Result};
pub use events::MarketEvent;
pub use ledger::*;
pub use market::{Market, MarketStatus, Position, VoteTally};
pub use payout::{DistributionReport, PayoutQuote, Settlement};
pub use registry::Resolver;
pub use shared::SharedEngine;
pub use vault::{InMemoryVault, TransferError, ValueTransfer};
pub use voting::{Deferral, Finalization};
