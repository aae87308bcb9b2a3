//! Common test utilities for verdict-core tests.
//!
//! Shared fixtures: a manually driven clock, an engine with funded identities,
//! staked resolvers and a market scheduled at [`START`]..[`END`].

use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::ledger::{Address, Amount, MarketId, Timestamp, ONE_ETHER, RESOLVER_STAKE_AMOUNT};
use crate::vault::InMemoryVault;
use std::sync::Arc;

/// Standard market start (Jan 1, 2025)
pub const START: Timestamp = 1_735_689_600;

/// Standard market end, one hour after start
pub const END: Timestamp = START + 3_600;

/// Default share price (0.01 ether)
pub const PRICE: Amount = ONE_ETHER / 100;

/// Balance given to every funded identity
pub const FUNDING: Amount = 100 * ONE_ETHER;

pub const BETTORS: [&str; 4] = ["alice", "bob", "carol", "dave"];

pub fn addr(name: &str) -> Address {
    Address::from(name)
}

/// Engine with default config, its clock pinned at `now`.
pub fn engine_at(now: Timestamp) -> (Engine<InMemoryVault>, ManualClock) {
    let clock = ManualClock::new(now);
    let engine = Engine::new(
        &EngineConfig::default(),
        InMemoryVault::new(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    (engine, clock)
}

/// Engine before [`START`] with bettors and resolvers `r0`..`r9` funded.
pub fn funded_engine() -> (Engine<InMemoryVault>, ManualClock) {
    let (mut engine, clock) = engine_at(START - 100);
    for name in BETTORS {
        engine.vault_mut().fund(&addr(name), FUNDING);
    }
    for i in 0..10 {
        engine.vault_mut().fund(&resolver(i), FUNDING);
    }
    (engine, clock)
}

pub fn resolver(index: usize) -> Address {
    Address::new(format!("r{index}"))
}

/// Stake resolvers `r0`..`r{count-1}` at the current time.
pub fn stake_resolvers(engine: &mut Engine<InMemoryVault>, count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| {
            let r = resolver(i);
            engine.stake(&r, RESOLVER_STAKE_AMOUNT).unwrap();
            r
        })
        .collect()
}

/// Open a market from `START` to `END` created by `creator`.
pub fn open_market(engine: &mut Engine<InMemoryVault>, creator_fee_bps: u32) -> MarketId {
    engine
        .open_market(
            &addr("creator"),
            "Will it rain tomorrow?",
            START,
            END,
            creator_fee_bps,
        )
        .unwrap()
}
