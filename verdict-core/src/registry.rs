//! # Resolver Registry
//!
//! Bonded resolver identities. A resolver record is created on the first stake,
//! deactivated on unstake and reactivated by staking again; records are never removed.
//!
//! Eligibility for a market is fixed at market-open time: only resolvers whose
//! `staking_time` is strictly before the market's `start_time` may vote on it.

use crate::{
    error::Result,
    ledger::{Address, Amount, Timestamp, RESOLVER_STAKE_AMOUNT},
    market::Market,
    MarketError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A bonded resolver.
///
/// Active resolvers always hold exactly [`RESOLVER_STAKE_AMOUNT`]; inactive ones hold zero.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Resolver {
    pub address: Address,
    pub staked_amount: Amount,
    pub staking_time: Timestamp,
    pub is_active: bool,
}

impl Resolver {
    /// Active and staked strictly before `start_time`.
    pub fn is_eligible_for(&self, start_time: Timestamp) -> bool {
        self.is_active && self.staking_time < start_time
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResolverRegistry {
    resolvers: BTreeMap<Address, Resolver>,
    /// Every identity that ever staked, in first-stake order
    known: Vec<Address>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &Address) -> Option<&Resolver> {
        self.resolvers.get(address)
    }

    /// Known-resolver index in first-stake order.
    pub fn known(&self) -> &[Address] {
        &self.known
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolver> {
        self.known.iter().filter_map(|a| self.resolvers.get(a))
    }

    /// Validate a stake request without mutating anything.
    pub fn check_stake(&self, actor: &Address, attached: Amount) -> Result<()> {
        actor.require_nonzero()?;
        if self.resolvers.get(actor).is_some_and(|r| r.is_active) {
            return Err(MarketError::AlreadyActive(actor.to_string()));
        }
        if attached != RESOLVER_STAKE_AMOUNT {
            return Err(MarketError::WrongStakeAmount {
                expected: RESOLVER_STAKE_AMOUNT,
                attached,
            });
        }
        Ok(())
    }

    /// Bond `attached` for `actor` at time `now`.
    pub fn stake(&mut self, actor: &Address, attached: Amount, now: Timestamp) -> Result<&Resolver> {
        self.check_stake(actor, attached)?;

        if !self.resolvers.contains_key(actor) {
            self.known.push(actor.clone());
        }
        let resolver = self
            .resolvers
            .entry(actor.clone())
            .or_insert_with(|| Resolver {
                address: actor.clone(),
                staked_amount: 0,
                staking_time: 0,
                is_active: false,
            });
        resolver.staked_amount = RESOLVER_STAKE_AMOUNT;
        resolver.staking_time = now;
        resolver.is_active = true;
        debug!(resolver = %actor, staking_time = now, "resolver bonded");
        Ok(resolver)
    }

    /// Deactivate `actor` and return the amount that must be paid back.
    ///
    /// The previous record is returned alongside so the caller can [`restore`](Self::restore)
    /// it if the refund transfer fails.
    pub fn unstake(&mut self, actor: &Address) -> Result<(Amount, Resolver)> {
        let resolver = self
            .resolvers
            .get_mut(actor)
            .filter(|r| r.is_active)
            .ok_or_else(|| MarketError::NotActiveResolver(actor.to_string()))?;
        if resolver.staked_amount == 0 {
            return Err(MarketError::NoStakeToWithdraw(actor.to_string()));
        }

        let previous = resolver.clone();
        resolver.staked_amount = 0;
        resolver.is_active = false;
        Ok((previous.staked_amount, previous))
    }

    /// Put back a record captured before a failed mutation.
    pub fn restore(&mut self, resolver: Resolver) {
        self.resolvers.insert(resolver.address.clone(), resolver);
    }

    /// Check that `actor` may vote on a market starting at `start_time`.
    pub fn require_eligible(&self, actor: &Address, start_time: Timestamp) -> Result<&Resolver> {
        let resolver = self
            .resolvers
            .get(actor)
            .filter(|r| r.is_active)
            .ok_or_else(|| MarketError::NotActiveResolver(actor.to_string()))?;
        if resolver.staking_time >= start_time {
            return Err(MarketError::NotEligible(actor.to_string()));
        }
        Ok(resolver)
    }

    /// Number of resolvers allowed to vote on a market starting at `start_time`.
    pub fn eligible_count(&self, start_time: Timestamp) -> usize {
        self.iter().filter(|r| r.is_eligible_for(start_time)).count()
    }

    /// Stake currently bonded by eligible resolvers that voted on `market`.
    pub fn voter_stake_value(&self, market: &Market) -> Result<Amount> {
        self.iter()
            .filter(|r| r.is_eligible_for(market.start_time) && market.has_voted(&r.address))
            .try_fold(0, |total: Amount, r| {
                total
                    .checked_add(r.staked_amount)
                    .ok_or(MarketError::Overflow)
            })
    }
}
