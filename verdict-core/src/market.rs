//! # Market Store
//!
//! Market records and the arena that owns them. Each market owns its per-bettor
//! share balances, its insertion-ordered bettor list (used to iterate payouts) and
//! its per-resolver vote records.
//!
//! Status only ever advances `Active -> Closed -> Resolved`.

use crate::{
    error::Result,
    ledger::{share_value, Address, Amount, BasisPoints, Direction, MarketId, Outcome, Shares, Timestamp},
    MarketError,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Lifecycle state of a market.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketStatus {
    /// Accepting bets between `start_time` and `end_time`
    Active,
    /// Past `end_time`, waiting for resolver votes
    Closed,
    /// Outcome decided; terminal
    Resolved,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MarketStatus::Active => "Active",
            MarketStatus::Closed => "Closed",
            MarketStatus::Resolved => "Resolved",
        };
        f.write_str(label)
    }
}

/// Shares held by one bettor in one market.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// Shares held on Yes
    pub yes_shares: Shares,
    /// Shares held on No
    pub no_shares: Shares,
}

impl Position {
    pub fn shares(&self, direction: Direction) -> Shares {
        match direction {
            Direction::Yes => self.yes_shares,
            Direction::No => self.no_shares,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.yes_shares == 0 && self.no_shares == 0
    }
}

/// Vote counts per choice.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
    pub invalid: u32,
}

impl VoteTally {
    pub fn total(&self) -> u32 {
        self.yes + self.no + self.invalid
    }
}

/// A binary-outcome prediction market.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Market {
    /// Sequential market identifier
    pub id: MarketId,
    /// Identity that opened the market and receives the creator fee
    pub creator: Address,
    /// Opaque description supplied by the creator
    pub metadata: String,
    /// First second at which shares can be bought
    pub start_time: Timestamp,
    /// Betting closes at this second; the market may be closed from here on
    pub end_time: Timestamp,
    /// Creator fee taken from each winning payout
    pub creator_fee: BasisPoints,
    /// Current lifecycle phase
    pub status: MarketStatus,
    /// `Outcome::None` until the market is resolved
    pub final_result: Outcome,
    /// Total shares bought on Yes
    pub total_yes_shares: Shares,
    /// Total shares bought on No
    pub total_no_shares: Shares,
    /// Resolver votes recorded so far
    pub votes: VoteTally,
    /// Share balances per bettor
    positions: BTreeMap<Address, Position>,
    /// Distinct bettors in first-purchase order
    bettors: Vec<Address>,
    /// Choice of every resolver that voted
    voters: BTreeMap<Address, Outcome>,
}

impl Market {
    /// SHA256 of the metadata, hex encoded.
    pub fn metadata_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.metadata.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Distinct bettors in first-purchase order.
    pub fn bettors(&self) -> &[Address] {
        &self.bettors
    }

    pub fn position(&self, bettor: &Address) -> Position {
        self.positions.get(bettor).copied().unwrap_or_default()
    }

    pub fn has_voted(&self, resolver: &Address) -> bool {
        self.voters.contains_key(resolver)
    }

    pub fn vote_of(&self, resolver: &Address) -> Option<Outcome> {
        self.voters.get(resolver).copied()
    }

    pub fn total_shares(&self, direction: Direction) -> Shares {
        match direction {
            Direction::Yes => self.total_yes_shares,
            Direction::No => self.total_no_shares,
        }
    }

    /// `(total_yes_shares + total_no_shares) * share_price`
    pub fn pool_value(&self, share_price: Amount) -> Result<Amount> {
        let shares = self
            .total_yes_shares
            .checked_add(self.total_no_shares)
            .ok_or(MarketError::Overflow)?;
        share_value(shares, share_price)
    }

    /// Credit `shares` on `direction` to `bettor`.
    pub(crate) fn record_shares(
        &mut self,
        bettor: &Address,
        direction: Direction,
        shares: Shares,
    ) -> Result<()> {
        let total = match direction {
            Direction::Yes => self.total_yes_shares,
            Direction::No => self.total_no_shares,
        }
        .checked_add(shares)
        .ok_or(MarketError::Overflow)?;

        let is_new = !self.positions.contains_key(bettor);
        let mut position = self.position(bettor);
        let held = match direction {
            Direction::Yes => &mut position.yes_shares,
            Direction::No => &mut position.no_shares,
        };
        *held = held.checked_add(shares).ok_or(MarketError::Overflow)?;

        match direction {
            Direction::Yes => self.total_yes_shares = total,
            Direction::No => self.total_no_shares = total,
        }
        self.positions.insert(bettor.clone(), position);
        // positions are never removed, so a missing entry means a first purchase
        if is_new {
            self.bettors.push(bettor.clone());
        }
        Ok(())
    }

    pub(crate) fn record_vote(&mut self, resolver: &Address, choice: Outcome) {
        match choice {
            Outcome::Yes => self.votes.yes += 1,
            Outcome::No => self.votes.no += 1,
            Outcome::Invalid => self.votes.invalid += 1,
            Outcome::None => return,
        }
        self.voters.insert(resolver.clone(), choice);
    }

    /// Zero both share balances of `bettor`, returning what was held.
    ///
    /// Market-wide totals are left untouched: payout math divides by them.
    pub(crate) fn take_position(&mut self, bettor: &Address) -> Position {
        match self.positions.get_mut(bettor) {
            Some(position) => std::mem::take(position),
            None => Position::default(),
        }
    }

    /// Undo a [`take_position`](Self::take_position) after a failed transfer.
    pub(crate) fn restore_position(&mut self, bettor: &Address, position: Position) {
        if let Some(slot) = self.positions.get_mut(bettor) {
            *slot = position;
        }
    }

    pub(crate) fn close(&mut self, now: Timestamp) -> Result<()> {
        if self.status != MarketStatus::Active {
            return Err(MarketError::MarketNotActive(self.id));
        }
        if now < self.end_time {
            return Err(MarketError::TooEarly(self.id));
        }
        self.status = MarketStatus::Closed;
        info!(market_id = self.id, "market closed");
        Ok(())
    }

    pub(crate) fn resolve(&mut self, outcome: Outcome) {
        self.status = MarketStatus::Resolved;
        self.final_result = outcome;
    }
}

/// Arena of markets keyed by sequential id.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MarketStore {
    markets: Vec<Market>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the schedule and fee, then store a new `Active` market.
    pub fn open(
        &mut self,
        creator: &Address,
        metadata: String,
        start_time: Timestamp,
        end_time: Timestamp,
        creator_fee_bps: u32,
        now: Timestamp,
    ) -> Result<MarketId> {
        creator.require_nonzero()?;
        if start_time <= now || end_time <= start_time {
            return Err(MarketError::InvalidSchedule {
                start_time,
                end_time,
                now,
            });
        }
        let creator_fee = BasisPoints::new(creator_fee_bps)?;

        let id = self.markets.len() as MarketId;
        self.markets.push(Market {
            id,
            creator: creator.clone(),
            metadata,
            start_time,
            end_time,
            creator_fee,
            status: MarketStatus::Active,
            final_result: Outcome::None,
            total_yes_shares: 0,
            total_no_shares: 0,
            votes: VoteTally::default(),
            positions: BTreeMap::new(),
            bettors: Vec::new(),
            voters: BTreeMap::new(),
        });
        Ok(id)
    }

    pub fn get(&self, id: MarketId) -> Result<&Market> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.markets.get(index))
            .ok_or(MarketError::MarketNotFound(id))
    }

    pub fn get_mut(&mut self, id: MarketId) -> Result<&mut Market> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.markets.get_mut(index))
            .ok_or(MarketError::MarketNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.markets.iter()
    }

    pub fn active_count(&self) -> usize {
        self.markets
            .iter()
            .filter(|m| m.status == MarketStatus::Active)
            .count()
    }

    /// Ids of active markets whose end time has passed.
    pub fn expired(&self, now: Timestamp) -> Vec<MarketId> {
        self.markets
            .iter()
            .filter(|m| m.status == MarketStatus::Active && now >= m.end_time)
            .map(|m| m.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_market() -> (MarketStore, MarketId) {
        let mut store = MarketStore::new();
        let id = store
            .open(&"creator".into(), "Will it rain?".to_string(), 110, 120, 100, 100)
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_open_assigns_sequential_ids() {
        let (mut store, first) = store_with_market();
        let second = store
            .open(&"creator".into(), "Second".to_string(), 110, 120, 0, 100)
            .unwrap();
        assert_eq!((first, second), (0, 1));

        let market = store.get(first).unwrap();
        assert_eq!(market.status, MarketStatus::Active);
        assert_eq!(market.final_result, Outcome::None);
        assert_eq!(market.creator_fee.get(), 100);
        assert_eq!(store.active_count(), 2);
    }

    #[test]
    fn test_open_rejects_bad_schedule_and_fee() {
        let mut store = MarketStore::new();
        let creator = Address::from("creator");
        assert!(matches!(
            store.open(&creator, String::new(), 100, 120, 0, 100),
            Err(MarketError::InvalidSchedule { .. })
        ));
        assert!(matches!(
            store.open(&creator, String::new(), 120, 120, 0, 100),
            Err(MarketError::InvalidSchedule { .. })
        ));
        assert!(matches!(
            store.open(&creator, String::new(), 110, 120, 501, 100),
            Err(MarketError::FeeTooHigh { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_shares_tracks_bettors_once() {
        let (mut store, id) = store_with_market();
        let market = store.get_mut(id).unwrap();
        let alice = Address::from("alice");
        let bob = Address::from("bob");

        market.record_shares(&alice, Direction::Yes, 2).unwrap();
        market.record_shares(&bob, Direction::No, 1).unwrap();
        market.record_shares(&alice, Direction::No, 3).unwrap();

        assert_eq!(market.bettors(), &[alice.clone(), bob]);
        assert_eq!(
            market.position(&alice),
            Position {
                yes_shares: 2,
                no_shares: 3
            }
        );
        assert_eq!(market.total_yes_shares, 2);
        assert_eq!(market.total_no_shares, 4);
        assert_eq!(market.pool_value(10).unwrap(), 60);
    }

    #[test]
    fn test_record_shares_after_settlement_and_overflow() {
        let (mut store, id) = store_with_market();
        let market = store.get_mut(id).unwrap();
        let alice = Address::from("alice");
        let bob = Address::from("bob");

        market.record_shares(&alice, Direction::Yes, 1).unwrap();
        market.take_position(&alice);
        market.record_shares(&alice, Direction::Yes, 1).unwrap();
        assert_eq!(market.bettors(), &[alice.clone()]);

        assert!(matches!(
            market.record_shares(&bob, Direction::Yes, Shares::MAX),
            Err(MarketError::Overflow)
        ));
        assert_eq!(market.bettors(), &[alice]);
        assert!(market.position(&bob).is_empty());
        assert_eq!(market.total_yes_shares, 2);
    }

    #[test]
    fn test_take_and_restore_position() {
        let (mut store, id) = store_with_market();
        let market = store.get_mut(id).unwrap();
        let alice = Address::from("alice");
        market.record_shares(&alice, Direction::Yes, 4).unwrap();

        let taken = market.take_position(&alice);
        assert_eq!(taken.yes_shares, 4);
        assert!(market.position(&alice).is_empty());
        assert_eq!(market.total_yes_shares, 4);

        market.restore_position(&alice, taken);
        assert_eq!(market.position(&alice).yes_shares, 4);
    }

    #[test]
    fn test_close_is_time_gated() {
        let (mut store, id) = store_with_market();
        let market = store.get_mut(id).unwrap();

        assert!(matches!(market.close(119), Err(MarketError::TooEarly(0))));
        market.close(120).unwrap();
        assert_eq!(market.status, MarketStatus::Closed);
        assert!(matches!(
            market.close(130),
            Err(MarketError::MarketNotActive(0))
        ));
    }

    #[test]
    fn test_record_vote_ignores_sentinel() {
        let (mut store, id) = store_with_market();
        let market = store.get_mut(id).unwrap();
        market.record_vote(&"r1".into(), Outcome::Yes);
        market.record_vote(&"r2".into(), Outcome::Invalid);
        market.record_vote(&"r3".into(), Outcome::None);

        assert_eq!(market.votes.total(), 2);
        assert!(market.has_voted(&"r1".into()));
        assert!(!market.has_voted(&"r3".into()));
        assert_eq!(market.vote_of(&"r2".into()), Some(Outcome::Invalid));
    }

    #[test]
    fn test_missing_market() {
        let store = MarketStore::new();
        assert!(matches!(store.get(7), Err(MarketError::MarketNotFound(7))));
    }

    #[test]
    fn test_expired_lists_only_active_past_end() {
        let (mut store, id) = store_with_market();
        store
            .open(&"creator".into(), "Later".to_string(), 110, 500, 0, 100)
            .unwrap();
        assert_eq!(store.expired(120), vec![id]);
        store.get_mut(id).unwrap().close(120).unwrap();
        assert!(store.expired(120).is_empty());
    }

    #[test]
    fn test_metadata_digest() {
        let (store, id) = store_with_market();
        let digest = store.get(id).unwrap().metadata_digest();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
