//! # Voting & Finalization
//!
//! Resolver votes on closed markets and the finalization check that runs after
//! every vote. A market resolves only once both gates pass:
//!
//! - **Quorum**: the vote count reaches the tier for the market's total bet value.
//! - **Economic security**: the stake bonded by eligible voters strictly exceeds
//!   the value at risk in the market.
//!
//! Outcome priority: `Invalid` when it strictly beats both sides, else `Yes` when it
//! strictly beats `No`, else `No`. A Yes/No tie therefore resolves to `No`.

use crate::{
    error::Result,
    ledger::{Address, Amount, Outcome, ONE_ETHER},
    market::{Market, MarketStatus, VoteTally},
    registry::ResolverRegistry,
    MarketError,
};
use serde::{Deserialize, Serialize};

/// Quorum tiers as `(minimum total bet value, required votes)`, ascending.
pub const QUORUM_TIERS: [(Amount, u32); 4] = [
    (0, 2),
    (ONE_ETHER / 10, 3),
    (ONE_ETHER / 2, 5),
    (ONE_ETHER, 7),
];

/// Votes required for a market holding `total_bets_value`.
///
/// The largest tier whose floor is met wins.
pub fn required_votes(total_bets_value: Amount) -> u32 {
    QUORUM_TIERS
        .iter()
        .filter(|(floor, _)| total_bets_value >= *floor)
        .map(|(_, votes)| *votes)
        .last()
        .unwrap_or(QUORUM_TIERS[0].1)
}

/// Pick the outcome from a tally.
pub fn decide_outcome(tally: &VoteTally) -> Outcome {
    if tally.invalid > tally.yes && tally.invalid > tally.no {
        Outcome::Invalid
    } else if tally.yes > tally.no {
        Outcome::Yes
    } else {
        Outcome::No
    }
}

/// Why a closed market stayed closed after a vote.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Deferral {
    QuorumNotMet { votes: u32, required: u32 },
    InsufficientStake { voter_stake: Amount, bets_value: Amount },
}

/// Result of a finalization check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finalization {
    Deferred(Deferral),
    Resolve(Outcome),
}

/// Reject a vote that must not be recorded.
pub fn validate_vote(
    market: &Market,
    registry: &ResolverRegistry,
    actor: &Address,
    choice: Outcome,
) -> Result<()> {
    if choice == Outcome::None {
        return Err(MarketError::InvalidChoice);
    }
    if market.status != MarketStatus::Closed {
        return Err(MarketError::MarketMustBeClosed(market.id));
    }
    registry.require_eligible(actor, market.start_time)?;
    if market.has_voted(actor) {
        return Err(MarketError::AlreadyVoted(actor.to_string()));
    }
    Ok(())
}

/// Decide whether a closed market can resolve now.
pub fn check_finalization(
    market: &Market,
    registry: &ResolverRegistry,
    share_price: Amount,
) -> Result<Finalization> {
    let bets_value = market.pool_value(share_price)?;
    let voter_stake = registry.voter_stake_value(market)?;
    let votes = market.votes.total();
    let required = required_votes(bets_value);

    if votes < required {
        return Ok(Finalization::Deferred(Deferral::QuorumNotMet { votes, required }));
    }
    if voter_stake <= bets_value {
        return Ok(Finalization::Deferred(Deferral::InsufficientStake {
            voter_stake,
            bets_value,
        }));
    }
    Ok(Finalization::Resolve(decide_outcome(&market.votes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Direction, RESOLVER_STAKE_AMOUNT};
    use crate::market::MarketStore;

    fn tally(yes: u32, no: u32, invalid: u32) -> VoteTally {
        VoteTally { yes, no, invalid }
    }

    #[test]
    fn test_required_votes_tiers() {
        assert_eq!(required_votes(0), 2);
        assert_eq!(required_votes(ONE_ETHER / 10 - 1), 2);
        assert_eq!(required_votes(ONE_ETHER / 10), 3);
        assert_eq!(required_votes(ONE_ETHER / 2 - 1), 3);
        assert_eq!(required_votes(ONE_ETHER / 2), 5);
        assert_eq!(required_votes(ONE_ETHER), 7);
        assert_eq!(required_votes(ONE_ETHER * 1_000), 7);
    }

    #[test]
    fn test_required_votes_is_monotonic() {
        let mut previous = 0;
        for step in 0..=40u128 {
            let value = step * ONE_ETHER / 20;
            let required = required_votes(value);
            assert!(required >= previous, "tier dropped at {value}");
            previous = required;
        }
    }

    #[test]
    fn test_decide_outcome_priority() {
        assert_eq!(decide_outcome(&tally(2, 1, 0)), Outcome::Yes);
        assert_eq!(decide_outcome(&tally(1, 2, 0)), Outcome::No);
        assert_eq!(decide_outcome(&tally(2, 2, 1)), Outcome::No);
        assert_eq!(decide_outcome(&tally(1, 1, 2)), Outcome::Invalid);
        // Invalid must strictly beat both sides
        assert_eq!(decide_outcome(&tally(2, 0, 2)), Outcome::Yes);
        assert_eq!(decide_outcome(&tally(0, 0, 0)), Outcome::No);
    }

    fn closed_market_with_voters(voters: &[&str]) -> (Market, ResolverRegistry) {
        let mut registry = ResolverRegistry::new();
        for voter in voters {
            registry
                .stake(&Address::from(*voter), RESOLVER_STAKE_AMOUNT, 50)
                .unwrap();
        }
        let mut store = MarketStore::new();
        let id = store
            .open(&"creator".into(), "m".to_string(), 110, 120, 0, 100)
            .unwrap();
        let mut market = store.get(id).unwrap().clone();
        market.close(120).unwrap();
        (market, registry)
    }

    #[test]
    fn test_validate_vote() {
        let (mut market, registry) = closed_market_with_voters(&["r1"]);
        let r1 = Address::from("r1");

        assert!(matches!(
            validate_vote(&market, &registry, &r1, Outcome::None),
            Err(MarketError::InvalidChoice)
        ));
        assert!(matches!(
            validate_vote(&market, &registry, &"stranger".into(), Outcome::Yes),
            Err(MarketError::NotActiveResolver(_))
        ));
        assert!(validate_vote(&market, &registry, &r1, Outcome::Yes).is_ok());

        market.record_vote(&r1, Outcome::Yes);
        assert!(matches!(
            validate_vote(&market, &registry, &r1, Outcome::No),
            Err(MarketError::AlreadyVoted(_))
        ));
    }

    #[test]
    fn test_check_finalization_gates() {
        let (mut market, registry) = closed_market_with_voters(&["r1", "r2"]);
        let price = RESOLVER_STAKE_AMOUNT / 2;
        market
            .record_shares(&"alice".into(), Direction::Yes, 1)
            .unwrap();

        market.record_vote(&"r1".into(), Outcome::Yes);
        assert_eq!(
            check_finalization(&market, &registry, price).unwrap(),
            Finalization::Deferred(Deferral::QuorumNotMet {
                votes: 1,
                required: 3
            })
        );

        market.record_vote(&"r2".into(), Outcome::Yes);
        market.record_shares(&"bob".into(), Direction::No, 3).unwrap();
        // 2 votes, pool 2 * stake: quorum tier for 1 ether needs 7 votes
        assert!(matches!(
            check_finalization(&market, &registry, price).unwrap(),
            Finalization::Deferred(Deferral::QuorumNotMet { .. })
        ));
    }

    #[test]
    fn test_check_finalization_security_gate() {
        let voters = ["r1", "r2", "r3", "r4", "r5", "r6", "r7"];
        let (mut market, registry) = closed_market_with_voters(&voters);
        market
            .record_shares(&"alice".into(), Direction::Yes, 4)
            .unwrap();
        for voter in voters {
            market.record_vote(&voter.into(), Outcome::Yes);
        }

        // 7 * 0.5 ether bonded against a 4 ether pool
        assert_eq!(
            check_finalization(&market, &registry, ONE_ETHER).unwrap(),
            Finalization::Deferred(Deferral::InsufficientStake {
                voter_stake: 7 * RESOLVER_STAKE_AMOUNT,
                bets_value: 4 * ONE_ETHER,
            })
        );

        // stake equal to the pool is still not enough
        let price = 7 * RESOLVER_STAKE_AMOUNT / 4;
        assert!(matches!(
            check_finalization(&market, &registry, price).unwrap(),
            Finalization::Deferred(Deferral::InsufficientStake { .. })
        ));

        assert_eq!(
            check_finalization(&market, &registry, ONE_ETHER / 2).unwrap(),
            Finalization::Resolve(Outcome::Yes)
        );
    }

    #[test]
    fn test_voter_stake_ignores_unstaked_voters() {
        let (mut market, mut registry) = closed_market_with_voters(&["r1", "r2"]);
        market.record_vote(&"r1".into(), Outcome::No);
        market.record_vote(&"r2".into(), Outcome::No);
        registry.unstake(&"r2".into()).unwrap();

        assert_eq!(
            registry.voter_stake_value(&market).unwrap(),
            RESOLVER_STAKE_AMOUNT
        );
        assert_eq!(
            check_finalization(&market, &registry, ONE_ETHER / 100).unwrap(),
            Finalization::Resolve(Outcome::No)
        );
    }
}
