//! # Betting Engine
//!
//! Validation of share purchases. A purchase must land inside the market's betting
//! window and carry exactly `share_count * share_price`; over- and under-payment
//! are both rejected.

use crate::{
    error::Result,
    ledger::{share_value, Amount, Shares, Timestamp},
    market::{Market, MarketStatus},
    MarketError,
};

/// Check a purchase against `market` and return the exact cost.
pub fn validate_purchase(
    market: &Market,
    now: Timestamp,
    share_count: Shares,
    attached: Amount,
    share_price: Amount,
) -> Result<Amount> {
    if market.status != MarketStatus::Active {
        return Err(MarketError::MarketNotActive(market.id));
    }
    if now < market.start_time {
        return Err(MarketError::MarketNotStarted(market.id));
    }
    if now >= market.end_time {
        return Err(MarketError::MarketEnded(market.id));
    }
    if share_count == 0 {
        return Err(MarketError::ZeroShares);
    }

    let expected = share_value(share_count, share_price)?;
    if attached != expected {
        return Err(MarketError::WrongPayment { expected, attached });
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketStore;

    fn market() -> Market {
        let mut store = MarketStore::new();
        let id = store
            .open(&"creator".into(), "Market".to_string(), 110, 120, 0, 100)
            .unwrap();
        store.get(id).unwrap().clone()
    }

    #[test]
    fn test_valid_purchase_returns_cost() {
        assert_eq!(validate_purchase(&market(), 110, 3, 30, 10).unwrap(), 30);
    }

    #[test]
    fn test_betting_window() {
        let market = market();
        assert!(matches!(
            validate_purchase(&market, 109, 1, 10, 10),
            Err(MarketError::MarketNotStarted(0))
        ));
        assert!(matches!(
            validate_purchase(&market, 120, 1, 10, 10),
            Err(MarketError::MarketEnded(0))
        ));
    }

    #[test]
    fn test_exact_payment_required() {
        let market = market();
        assert!(matches!(
            validate_purchase(&market, 115, 3, 31, 10),
            Err(MarketError::WrongPayment {
                expected: 30,
                attached: 31
            })
        ));
        assert!(matches!(
            validate_purchase(&market, 115, 3, 29, 10),
            Err(MarketError::WrongPayment { .. })
        ));
        assert!(matches!(
            validate_purchase(&market, 115, 0, 0, 10),
            Err(MarketError::ZeroShares)
        ));
    }

    #[test]
    fn test_closed_market_rejects_purchase() {
        let mut market = market();
        market.status = MarketStatus::Closed;
        assert!(matches!(
            validate_purchase(&market, 115, 1, 10, 10),
            Err(MarketError::MarketNotActive(0))
        ));
    }
}
