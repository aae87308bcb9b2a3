//! # Prediction Engine
//!
//! The single entry point for every boundary operation. Mutating calls take
//! `&mut self`, so one logical transaction runs at a time; value-moving calls run
//! inside a vault checkpoint and are rolled back as a whole on failure.
//!
//! Voting cascades within the same call: a vote may finalize the market, and
//! finalization immediately runs the bulk distribution.

use crate::{
    clock::Clock,
    config::{EngineConfig, GlobalConfig},
    error::Result,
    events::MarketEvent,
    ledger::{Address, Amount, BasisPoints, Direction, MarketId, Outcome, Shares, Timestamp},
    market::{Market, MarketStatus, MarketStore, Position, VoteTally},
    payout::{self, DistributionReport, Settlement},
    registry::{Resolver, ResolverRegistry},
    vault::{InMemoryVault, ValueTransfer},
    voting::{self, Finalization},
    MarketError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Persisted engine state: configuration, resolvers and markets.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EngineSnapshot {
    pub config: GlobalConfig,
    pub registry: ResolverRegistry,
    pub markets: MarketStore,
}

/// Read-only summary of a market.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarketInfo {
    pub id: MarketId,
    pub creator: Address,
    pub metadata: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub creator_fee_bps: u32,
    pub status: MarketStatus,
    pub final_result: Outcome,
    pub total_yes_shares: Shares,
    pub total_no_shares: Shares,
    pub pool_value: Amount,
    pub bettor_count: usize,
}

/// Market engine over a value vault `V`.
///
/// Owns the global configuration, the resolver registry and every market. Value
/// moves only through `V`; time comes only from the injected [`Clock`].
pub struct Engine<V = InMemoryVault> {
    /// Runtime configuration, mutated by the owner setters
    config: GlobalConfig,
    /// Bonded resolvers
    registry: ResolverRegistry,
    /// Market arena
    markets: MarketStore,
    /// Custody of every bet, bond and payout
    vault: V,
    clock: Arc<dyn Clock>,
    /// Events of committed transactions, oldest first
    events: Vec<MarketEvent>,
}

impl<V: ValueTransfer> Engine<V> {
    pub fn new(config: &EngineConfig, vault: V, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = config.validate()?;
        info!(owner = %config.owner, share_price = config.share_price, "engine initialized");
        Ok(Self {
            config,
            registry: ResolverRegistry::new(),
            markets: MarketStore::new(),
            vault,
            clock,
            events: Vec::new(),
        })
    }

    /// Rebuild an engine from persisted state.
    pub fn restore(snapshot: EngineSnapshot, vault: V, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: snapshot.config,
            registry: snapshot.registry,
            markets: snapshot.markets,
            vault,
            clock,
            events: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            config: self.config.clone(),
            registry: self.registry.clone(),
            markets: self.markets.clone(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    /// Run `op` as one transaction: on error every vault movement and event it
    /// produced is discarded.
    fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.vault.checkpoint();
        let events = self.events.len();
        match op(self) {
            Ok(value) => {
                self.vault.commit(checkpoint);
                Ok(value)
            }
            Err(err) => {
                self.vault.rollback(checkpoint);
                self.events.truncate(events);
                debug!(%err, "transaction rolled back");
                Err(err)
            }
        }
    }

    /// [`atomically`](Self::atomically) for an operation that mutates one market:
    /// on error the market record is put back as it was before `op` ran.
    fn atomically_on<T>(
        &mut self,
        market_id: MarketId,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.markets.get(market_id)?.clone();
        let result = self.atomically(op);
        if result.is_err() {
            if let Ok(market) = self.markets.get_mut(market_id) {
                *market = saved;
            }
        }
        result
    }

    // ---------------------------------------------------------------------
    // Markets and betting
    // ---------------------------------------------------------------------

    pub fn open_market(
        &mut self,
        creator: &Address,
        metadata: impl Into<String>,
        start_time: Timestamp,
        end_time: Timestamp,
        creator_fee_bps: u32,
    ) -> Result<MarketId> {
        let now = self.now();
        let id = self.markets.open(
            creator,
            metadata.into(),
            start_time,
            end_time,
            creator_fee_bps,
            now,
        )?;
        let market = self.markets.get(id)?;
        self.events.push(MarketEvent::MarketCreated {
            market_id: id,
            creator: creator.clone(),
            metadata_digest: market.metadata_digest(),
            start_time,
            end_time,
            creator_fee_bps,
        });
        info!(market_id = id, creator = %creator, start_time, end_time, "market opened");
        Ok(id)
    }

    /// Buy `share_count` shares on `direction`, attaching exactly their cost.
    pub fn buy_shares(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        direction: Direction,
        share_count: Shares,
        attached: Amount,
    ) -> Result<()> {
        self.atomically_on(market_id, |engine| {
            let now = engine.now();
            let market = engine.markets.get_mut(market_id)?;
            let paid = crate::betting::validate_purchase(
                market,
                now,
                share_count,
                attached,
                engine.config.share_price,
            )?;
            engine.vault.deposit(actor, paid)?;
            market.record_shares(actor, direction, share_count)?;

            engine.events.push(MarketEvent::SharesBought {
                market_id,
                buyer: actor.clone(),
                direction,
                shares: share_count,
                paid,
            });
            info!(market_id, buyer = %actor, ?direction, shares = share_count, paid, "shares bought");
            Ok(())
        })
    }

    /// Time gate into the voting phase. Callable by anyone.
    pub fn close_market(&mut self, market_id: MarketId) -> Result<()> {
        let now = self.now();
        self.markets.get_mut(market_id)?.close(now)?;
        self.events.push(MarketEvent::MarketClosed { market_id });
        Ok(())
    }

    /// Close every active market whose end time has passed.
    pub fn close_expired_markets(&mut self) -> Result<Vec<MarketId>> {
        let expired = self.markets.expired(self.now());
        for id in &expired {
            self.close_market(*id)?;
        }
        Ok(expired)
    }

    // ---------------------------------------------------------------------
    // Resolvers
    // ---------------------------------------------------------------------

    /// Bond [`RESOLVER_STAKE_AMOUNT`](crate::RESOLVER_STAKE_AMOUNT) for `actor`.
    pub fn stake(&mut self, actor: &Address, attached: Amount) -> Result<()> {
        self.atomically(|engine| {
            let now = engine.now();
            engine.registry.check_stake(actor, attached)?;
            engine.vault.deposit(actor, attached)?;
            let resolver = engine.registry.stake(actor, attached, now)?;

            engine.events.push(MarketEvent::ResolverStaked {
                resolver: actor.clone(),
                amount: resolver.staked_amount,
                staking_time: now,
            });
            info!(resolver = %actor, staking_time = now, "resolver staked");
            Ok(())
        })
    }

    /// Release the bond and revoke voting eligibility, all or nothing.
    pub fn unstake(&mut self, actor: &Address) -> Result<Amount> {
        self.atomically(|engine| {
            let (amount, previous) = engine.registry.unstake(actor)?;
            if let Err(err) = engine.vault.transfer(actor, amount) {
                engine.registry.restore(previous);
                return Err(err.into());
            }

            engine.events.push(MarketEvent::ResolverUnstaked {
                resolver: actor.clone(),
                amount,
            });
            info!(resolver = %actor, amount, "resolver unstaked");
            Ok(amount)
        })
    }

    // ---------------------------------------------------------------------
    // Voting and finalization
    // ---------------------------------------------------------------------

    /// Record a resolver vote, then attempt finalization.
    pub fn vote(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        choice: Outcome,
    ) -> Result<Finalization> {
        if choice == Outcome::None {
            return Err(MarketError::InvalidChoice);
        }
        self.atomically_on(market_id, |engine| {
            let market = engine.markets.get_mut(market_id)?;
            voting::validate_vote(market, &engine.registry, actor, choice)?;
            market.record_vote(actor, choice);

            engine.events.push(MarketEvent::VoteCast {
                market_id,
                resolver: actor.clone(),
                choice,
            });
            info!(market_id, resolver = %actor, %choice, "vote cast");
            engine.finalize(market_id)
        })
    }

    fn finalize(&mut self, market_id: MarketId) -> Result<Finalization> {
        let market = self.markets.get_mut(market_id)?;
        let finalization =
            voting::check_finalization(market, &self.registry, self.config.share_price)?;

        match finalization {
            Finalization::Deferred(reason) => {
                debug!(market_id, ?reason, "finalization deferred");
                self.events
                    .push(MarketEvent::FinalizationDeferred { market_id, reason });
            }
            Finalization::Resolve(outcome) => {
                market.resolve(outcome);
                self.events
                    .push(MarketEvent::MarketResolved { market_id, outcome });
                info!(market_id, %outcome, "market resolved");
                payout::distribute(market, &self.config, &mut self.vault, &mut self.events)?;
            }
        }
        Ok(finalization)
    }

    // ---------------------------------------------------------------------
    // Payouts
    // ---------------------------------------------------------------------

    /// Claim the caller's payout. A failed transfer aborts the whole claim.
    pub fn claim(&mut self, actor: &Address, market_id: MarketId) -> Result<Amount> {
        self.atomically_on(market_id, |engine| {
            let market = engine.markets.get_mut(market_id)?;
            payout::claim(
                market,
                &engine.config,
                &mut engine.vault,
                actor,
                &mut engine.events,
            )
        })
    }

    /// Re-run bulk distribution for a resolved market. Owner only.
    pub fn force_distribute(
        &mut self,
        actor: &Address,
        market_id: MarketId,
    ) -> Result<DistributionReport> {
        self.config.require_owner(actor)?;
        self.atomically_on(market_id, |engine| {
            let market = engine.markets.get_mut(market_id)?;
            let report =
                payout::distribute(market, &engine.config, &mut engine.vault, &mut engine.events)?;
            info!(market_id, paid = report.paid, forfeited = report.forfeited, "forced distribution");
            Ok(report)
        })
    }

    // ---------------------------------------------------------------------
    // Owner settings
    // ---------------------------------------------------------------------

    pub fn set_share_price(&mut self, actor: &Address, share_price: Amount) -> Result<()> {
        self.config.require_owner(actor)?;
        if share_price == 0 {
            return Err(MarketError::InvalidSharePrice);
        }
        self.config.share_price = share_price;
        self.events
            .push(MarketEvent::SharePriceUpdated { share_price });
        info!(share_price, "share price updated");
        Ok(())
    }

    pub fn set_platform_fee_percent(&mut self, actor: &Address, fee_bps: u32) -> Result<()> {
        self.config.require_owner(actor)?;
        self.config.platform_fee = BasisPoints::new(fee_bps)?;
        self.events.push(MarketEvent::PlatformFeeUpdated { fee_bps });
        info!(fee_bps, "platform fee updated");
        Ok(())
    }

    pub fn set_platform_address(&mut self, actor: &Address, platform: &Address) -> Result<()> {
        self.config.require_owner(actor)?;
        platform.require_nonzero()?;
        self.config.platform_address = platform.clone();
        self.events.push(MarketEvent::PlatformAddressUpdated {
            platform_address: platform.clone(),
        });
        info!(platform = %platform, "platform address updated");
        Ok(())
    }

    pub fn transfer_ownership(&mut self, actor: &Address, new_owner: &Address) -> Result<()> {
        self.config.require_owner(actor)?;
        new_owner.require_nonzero()?;
        let previous_owner = std::mem::replace(&mut self.config.owner, new_owner.clone());
        self.events.push(MarketEvent::OwnershipTransferred {
            previous_owner,
            new_owner: new_owner.clone(),
        });
        info!(owner = %new_owner, "ownership transferred");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn market(&self, market_id: MarketId) -> Result<&Market> {
        self.markets.get(market_id)
    }

    pub fn market_info(&self, market_id: MarketId) -> Result<MarketInfo> {
        let market = self.markets.get(market_id)?;
        Ok(MarketInfo {
            id: market.id,
            creator: market.creator.clone(),
            metadata: market.metadata.clone(),
            start_time: market.start_time,
            end_time: market.end_time,
            creator_fee_bps: market.creator_fee.get(),
            status: market.status,
            final_result: market.final_result,
            total_yes_shares: market.total_yes_shares,
            total_no_shares: market.total_no_shares,
            pool_value: market.pool_value(self.config.share_price)?,
            bettor_count: market.bettors().len(),
        })
    }

    pub fn market_votes(&self, market_id: MarketId) -> Result<VoteTally> {
        Ok(self.markets.get(market_id)?.votes)
    }

    pub fn user_shares(&self, market_id: MarketId, user: &Address) -> Result<Position> {
        Ok(self.markets.get(market_id)?.position(user))
    }

    pub fn eligible_resolver_count(&self, market_id: MarketId) -> Result<usize> {
        let market = self.markets.get(market_id)?;
        Ok(self.registry.eligible_count(market.start_time))
    }

    pub fn voter_stake_value(&self, market_id: MarketId) -> Result<Amount> {
        self.registry
            .voter_stake_value(self.markets.get(market_id)?)
    }

    pub fn active_market_count(&self) -> usize {
        self.markets.active_count()
    }

    pub fn bettors_of(&self, market_id: MarketId) -> Result<Vec<Address>> {
        Ok(self.markets.get(market_id)?.bettors().to_vec())
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    pub fn resolver_info(&self, resolver: &Address) -> Option<&Resolver> {
        self.registry.get(resolver)
    }

    pub fn resolvers(&self) -> impl Iterator<Item = &Resolver> {
        self.registry.iter()
    }

    pub fn has_voted(&self, market_id: MarketId, resolver: &Address) -> Result<bool> {
        Ok(self.markets.get(market_id)?.has_voted(resolver))
    }

    /// Quorum currently required for the market.
    pub fn required_votes(&self, market_id: MarketId) -> Result<u32> {
        let market = self.markets.get(market_id)?;
        Ok(voting::required_votes(
            market.pool_value(self.config.share_price)?,
        ))
    }

    /// What `claim` would pay `user` right now.
    pub fn preview_payout(&self, market_id: MarketId, user: &Address) -> Result<Settlement> {
        let market = self.markets.get(market_id)?;
        payout::settle(market, market.position(user), &self.config)
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.events)
    }
}
