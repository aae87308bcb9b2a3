//! # Payout Engine
//!
//! Pari-mutuel settlement of resolved markets.
//!
//! - `Invalid`: every bettor gets `(yes_shares + no_shares) * share_price` back, no fees.
//! - `Yes`/`No`: a winner's gross is `winner_shares * pool_value / total_winning_shares`
//!   (integer division). Platform and creator fees are taken from the gross and paid
//!   before the net goes to the winner. Losing shares are zeroed without a transfer.
//!
//! Two paths share this math. [`claim`] is all-or-nothing: any failed transfer aborts
//! it and the caller restores the position. [`distribute`] never aborts on a transfer
//! failure: the position is zeroed regardless and the payout is forfeited, observable
//! only through a `success: false` event.

use crate::{
    config::GlobalConfig,
    error::Result,
    events::MarketEvent,
    ledger::{share_value, Address, Amount, BasisPoints, Outcome, Shares},
    market::{Market, MarketStatus, Position},
    vault::{TransferError, ValueTransfer},
    MarketError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fee split of one winning position.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PayoutQuote {
    pub gross: Amount,
    pub platform_fee: Amount,
    pub creator_fee: Amount,
    pub net: Amount,
}

/// What a position is worth once its market resolved.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Voided market: stake returned in full
    Refund(Amount),
    Win(PayoutQuote),
    /// Losing or empty position
    Nothing,
}

impl Settlement {
    /// Amount that reaches the bettor.
    pub fn bettor_amount(&self) -> Amount {
        match self {
            Settlement::Refund(amount) => *amount,
            Settlement::Win(quote) => quote.net,
            Settlement::Nothing => 0,
        }
    }
}

/// Gross winnings and fees for `winner_shares` out of `total_winning_shares`.
pub fn quote_winnings(
    winner_shares: Shares,
    total_winning_shares: Shares,
    pool_value: Amount,
    platform_fee: BasisPoints,
    creator_fee: BasisPoints,
) -> Result<PayoutQuote> {
    if winner_shares == 0 || total_winning_shares == 0 {
        return Ok(PayoutQuote::default());
    }
    let gross = winner_shares
        .checked_mul(pool_value)
        .ok_or(MarketError::Overflow)?
        / total_winning_shares;
    let platform_fee = platform_fee.apply(gross)?;
    let creator_fee = creator_fee.apply(gross)?;
    Ok(PayoutQuote {
        gross,
        platform_fee,
        creator_fee,
        net: gross - platform_fee - creator_fee,
    })
}

/// Value of `position` in a resolved `market`.
pub fn settle(market: &Market, position: Position, config: &GlobalConfig) -> Result<Settlement> {
    if market.status != MarketStatus::Resolved {
        return Err(MarketError::MarketNotResolved(market.id));
    }
    match market.final_result {
        Outcome::Invalid => {
            let shares = position
                .yes_shares
                .checked_add(position.no_shares)
                .ok_or(MarketError::Overflow)?;
            match share_value(shares, config.share_price)? {
                0 => Ok(Settlement::Nothing),
                refund => Ok(Settlement::Refund(refund)),
            }
        }
        outcome => {
            let Some(side) = outcome.winning_direction() else {
                return Err(MarketError::MarketNotResolved(market.id));
            };
            let winner_shares = position.shares(side);
            if winner_shares == 0 {
                return Ok(Settlement::Nothing);
            }
            let quote = quote_winnings(
                winner_shares,
                market.total_shares(side),
                market.pool_value(config.share_price)?,
                config.platform_fee,
                market.creator_fee,
            )?;
            Ok(Settlement::Win(quote))
        }
    }
}

/// Totals of one bulk distribution run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Bettors whose position was settled (paid, forfeited or zeroed)
    pub settled: usize,
    pub paid: Amount,
    pub forfeited: Amount,
    pub fees: Amount,
}

/// On-demand claim for `claimant`. Returns the amount the claimant received.
///
/// On error the position has already been put back; the caller must still roll
/// back the vault.
pub(crate) fn claim<V: ValueTransfer>(
    market: &mut Market,
    config: &GlobalConfig,
    vault: &mut V,
    claimant: &Address,
    events: &mut Vec<MarketEvent>,
) -> Result<Amount> {
    let settlement = settle(market, market.position(claimant), config)?;
    let position = market.take_position(claimant);

    let mut emitted = Vec::new();
    let paid = pay(market, config, vault, claimant, &settlement, true, |event| {
        emitted.push(event)
    });
    if let Err(err) = paid {
        market.restore_position(claimant, position);
        return Err(err.into());
    }

    let amount = settlement.bettor_amount();
    events.extend(emitted);
    events.push(MarketEvent::WinningsClaimed {
        market_id: market.id,
        claimant: claimant.clone(),
        amount,
    });
    debug!(market_id = market.id, claimant = %claimant, amount, "winnings claimed");
    Ok(amount)
}

/// Bulk distribution over every bettor of a resolved market.
pub(crate) fn distribute<V: ValueTransfer>(
    market: &mut Market,
    config: &GlobalConfig,
    vault: &mut V,
    events: &mut Vec<MarketEvent>,
) -> Result<DistributionReport> {
    if market.status != MarketStatus::Resolved {
        return Err(MarketError::MarketNotResolved(market.id));
    }

    // Price every position before zeroing any of them
    let plan = market
        .bettors()
        .iter()
        .filter(|bettor| !market.position(bettor).is_empty())
        .map(|bettor| Ok((bettor.clone(), settle(market, market.position(bettor), config)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut report = DistributionReport::default();
    for (bettor, settlement) in &plan {
        market.take_position(bettor);
        report.settled += 1;
        if *settlement == Settlement::Nothing {
            continue;
        }

        let amount = settlement.bettor_amount();
        let outcome = pay(market, config, vault, bettor, settlement, false, |event| {
            events.push(event)
        })?;
        report.fees += outcome.fees_paid;
        if outcome.bettor_paid {
            report.paid += amount;
        } else {
            warn!(market_id = market.id, bettor = %bettor, amount, "payout forfeited");
            report.forfeited += amount;
        }
        events.push(MarketEvent::PayoutDistributed {
            market_id: market.id,
            recipient: bettor.clone(),
            amount,
            success: outcome.bettor_paid,
        });
    }
    debug!(market_id = market.id, ?report, "distribution finished");
    Ok(report)
}

struct PayOutcome {
    fees_paid: Amount,
    bettor_paid: bool,
}

/// Move the value of one settlement: fees first, then the bettor's share.
///
/// With `strict` the first failed transfer is returned as an error. Otherwise
/// failures are only reported through `on_event` and the returned flags.
fn pay<V: ValueTransfer>(
    market: &Market,
    config: &GlobalConfig,
    vault: &mut V,
    bettor: &Address,
    settlement: &Settlement,
    strict: bool,
    mut on_event: impl FnMut(MarketEvent),
) -> std::result::Result<PayOutcome, TransferError> {
    let (fees, amount) = match settlement {
        Settlement::Nothing => {
            return Ok(PayOutcome {
                fees_paid: 0,
                bettor_paid: true,
            })
        }
        Settlement::Refund(amount) => (Vec::new(), *amount),
        Settlement::Win(quote) => (
            vec![
                (&config.platform_address, quote.platform_fee),
                (&market.creator, quote.creator_fee),
            ],
            quote.net,
        ),
    };

    let mut fees_paid = 0;
    for (recipient, fee) in fees.into_iter().filter(|(_, fee)| *fee > 0) {
        let result = vault.transfer(recipient, fee);
        on_event(MarketEvent::FeePaid {
            market_id: market.id,
            recipient: recipient.clone(),
            amount: fee,
            success: result.is_ok(),
        });
        match result {
            Ok(()) => fees_paid += fee,
            Err(err) if strict => return Err(err),
            Err(err) => {
                warn!(market_id = market.id, recipient = %recipient, fee, %err, "fee transfer failed")
            }
        }
    }

    let bettor_paid = match vault.transfer(bettor, amount) {
        Ok(()) => true,
        Err(err) if strict => return Err(err),
        Err(err) => {
            warn!(market_id = market.id, bettor = %bettor, %err, "bettor transfer failed");
            false
        }
    };
    Ok(PayOutcome {
        fees_paid,
        bettor_paid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ledger::{Direction, ONE_ETHER};
    use crate::market::MarketStore;
    use crate::vault::InMemoryVault;

    const PRICE: Amount = ONE_ETHER / 100;

    fn config() -> GlobalConfig {
        EngineConfig {
            share_price: PRICE,
            platform_fee_bps: 50,
            ..EngineConfig::default()
        }
        .validate()
        .unwrap()
    }

    /// Resolved market with alice 3 Yes, bob 1 No, carol 1 Yes; vault funded with the pool.
    fn resolved(outcome: Outcome) -> (Market, InMemoryVault) {
        let mut store = MarketStore::new();
        let id = store
            .open(&"creator".into(), "m".to_string(), 110, 120, 100, 100)
            .unwrap();
        let mut market = store.get(id).unwrap().clone();
        market.record_shares(&"alice".into(), Direction::Yes, 3).unwrap();
        market.record_shares(&"bob".into(), Direction::No, 1).unwrap();
        market.record_shares(&"carol".into(), Direction::Yes, 1).unwrap();
        market.close(120).unwrap();
        market.resolve(outcome);

        let mut vault = InMemoryVault::new();
        let pool = market.pool_value(PRICE).unwrap();
        vault.fund(&"house".into(), pool);
        vault.deposit(&"house".into(), pool).unwrap();
        (market, vault)
    }

    #[test]
    fn test_quote_winnings_fee_split() {
        let fee = |bps| BasisPoints::new(bps).unwrap();
        let quote = quote_winnings(1, 1, 2 * PRICE, fee(50), fee(100)).unwrap();
        assert_eq!(quote.gross, 2 * PRICE);
        assert_eq!(quote.platform_fee, 2 * PRICE / 200);
        assert_eq!(quote.creator_fee, 2 * PRICE / 100);
        assert_eq!(quote.net, 2 * PRICE - 2 * PRICE / 200 - 2 * PRICE / 100);
    }

    #[test]
    fn test_quote_winnings_rounds_down() {
        let zero = BasisPoints::default();
        let quote = quote_winnings(1, 3, 100, zero, zero).unwrap();
        assert_eq!(quote.gross, 33);
        assert_eq!(quote_winnings(0, 3, 100, zero, zero).unwrap(), PayoutQuote::default());
    }

    #[test]
    fn test_settle_requires_resolution() {
        let (mut market, _) = resolved(Outcome::Yes);
        market.status = MarketStatus::Closed;
        assert!(matches!(
            settle(&market, Position::default(), &config()),
            Err(MarketError::MarketNotResolved(_))
        ));
    }

    #[test]
    fn test_settle_invalid_refunds_everything() {
        let (market, _) = resolved(Outcome::Invalid);
        let position = Position {
            yes_shares: 2,
            no_shares: 1,
        };
        assert_eq!(
            settle(&market, position, &config()).unwrap(),
            Settlement::Refund(3 * PRICE)
        );
    }

    #[test]
    fn test_claim_pays_fees_then_winner() {
        let (mut market, mut vault) = resolved(Outcome::Yes);
        let config = config();
        let mut events = Vec::new();

        let paid = claim(&mut market, &config, &mut vault, &"alice".into(), &mut events).unwrap();

        // 3 of 4 winning shares of a 5 share pool
        let gross = 3 * 5 * PRICE / 4;
        let expected = gross - gross * 50 / 10_000 - gross * 100 / 10_000;
        assert_eq!(paid, expected);
        assert_eq!(vault.balance_of(&"alice".into()), expected);
        assert_eq!(vault.balance_of(&"platform".into()), gross * 50 / 10_000);
        assert_eq!(vault.balance_of(&"creator".into()), gross * 100 / 10_000);
        assert!(market.position(&"alice".into()).is_empty());

        let again = claim(&mut market, &config, &mut vault, &"alice".into(), &mut events).unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_claim_failure_restores_position() {
        let (mut market, mut vault) = resolved(Outcome::Yes);
        vault.reject(&"alice".into());
        let mut events = Vec::new();

        let err = claim(&mut market, &config(), &mut vault, &"alice".into(), &mut events)
            .unwrap_err();
        assert!(matches!(err, MarketError::Transfer(TransferError::Rejected(_))));
        assert_eq!(market.position(&"alice".into()).yes_shares, 3);
        assert!(events.is_empty());
    }

    #[test]
    fn test_distribute_forfeits_failed_winner() {
        let (mut market, mut vault) = resolved(Outcome::Yes);
        vault.reject(&"carol".into());
        let mut events = Vec::new();

        let report = distribute(&mut market, &config(), &mut vault, &mut events).unwrap();

        assert_eq!(report.settled, 3);
        assert!(report.paid > 0);
        assert!(report.forfeited > 0);
        assert_eq!(vault.balance_of(&"carol".into()), 0);
        assert!(market.position(&"carol".into()).is_empty());
        assert!(market.position(&"bob".into()).is_empty());
        assert!(events.contains(&MarketEvent::PayoutDistributed {
            market_id: market.id,
            recipient: "carol".into(),
            amount: report.forfeited,
            success: false,
        }));

        // nothing left to pay on a second run
        let rerun = distribute(&mut market, &config(), &mut vault, &mut Vec::new()).unwrap();
        assert_eq!(rerun, DistributionReport::default());
    }

    #[test]
    fn test_distribute_invalid_refunds_without_fees() {
        let (mut market, mut vault) = resolved(Outcome::Invalid);
        let report = distribute(&mut market, &config(), &mut vault, &mut Vec::new()).unwrap();

        assert_eq!(report.paid, 5 * PRICE);
        assert_eq!(report.fees, 0);
        assert_eq!(vault.held(), 0);
        assert_eq!(vault.balance_of(&"alice".into()), 3 * PRICE);
        assert_eq!(vault.balance_of(&"bob".into()), PRICE);
    }
}
