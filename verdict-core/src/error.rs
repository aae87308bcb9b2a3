//! Error types for verdict-core

use crate::ledger::{Amount, MarketId};
use crate::vault::TransferError;
use thiserror::Error;

/// Result type alias for verdict operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Coarse classification of a [`MarketError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; retrying with corrected input succeeds.
    Validation,
    /// The call does not fit the current market or resolver state.
    State,
    /// A value transfer was refused.
    Transfer,
    /// A privileged operation was attempted by someone other than the owner.
    Authorization,
    /// Overflow, persistence or concurrency failures.
    Internal,
}

/// Error types for market operations
#[derive(Error, Debug)]
pub enum MarketError {
    /// Schedule must satisfy `now < start_time < end_time`
    #[error("Invalid schedule: start {start_time}, end {end_time}, now {now}")]
    InvalidSchedule {
        start_time: u64,
        end_time: u64,
        now: u64,
    },

    #[error("Fee too high: {fee} bps exceeds the {max} bps cap")]
    FeeTooHigh { fee: u32, max: u32 },

    #[error("Market {0} not found")]
    MarketNotFound(MarketId),

    #[error("Market {0} is not active")]
    MarketNotActive(MarketId),

    #[error("Market {0} has not started yet")]
    MarketNotStarted(MarketId),

    #[error("Market {0} has ended")]
    MarketEnded(MarketId),

    #[error("Share count must be greater than zero")]
    ZeroShares,

    /// Attached value must match `share_count * share_price` exactly
    #[error("Wrong payment: expected {expected}, attached {attached}")]
    WrongPayment { expected: Amount, attached: Amount },

    #[error("Market {0} cannot be closed before its end time")]
    TooEarly(MarketId),

    #[error("Vote choice must be Yes, No or Invalid")]
    InvalidChoice,

    #[error("Market {0} must be closed to accept votes")]
    MarketMustBeClosed(MarketId),

    #[error("Market {0} has not been resolved")]
    MarketNotResolved(MarketId),

    #[error("Not an active resolver: {0}")]
    NotActiveResolver(String),

    /// Resolver staked at or after the market start
    #[error("Resolver {0} is not eligible for this market")]
    NotEligible(String),

    #[error("Resolver {0} already voted on this market")]
    AlreadyVoted(String),

    #[error("Resolver {0} is already active")]
    AlreadyActive(String),

    #[error("Wrong stake amount: expected {expected}, attached {attached}")]
    WrongStakeAmount { expected: Amount, attached: Amount },

    #[error("No stake to withdraw for {0}")]
    NoStakeToWithdraw(String),

    #[error("Unauthorized: {0} is not the owner")]
    Unauthorized(String),

    #[error("Share price must be greater than zero")]
    InvalidSharePrice,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Reentrant call rejected")]
    ReentrantCall,

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Serde JSON errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            InvalidSchedule { .. }
            | FeeTooHigh { .. }
            | ZeroShares
            | WrongPayment { .. }
            | InvalidChoice
            | WrongStakeAmount { .. }
            | InvalidSharePrice
            | InvalidAddress(_) => ErrorKind::Validation,
            MarketNotFound(_)
            | MarketNotActive(_)
            | MarketNotStarted(_)
            | MarketEnded(_)
            | TooEarly(_)
            | MarketMustBeClosed(_)
            | MarketNotResolved(_)
            | NotActiveResolver(_)
            | NotEligible(_)
            | AlreadyVoted(_)
            | AlreadyActive(_)
            | NoStakeToWithdraw(_) => ErrorKind::State,
            Transfer(_) => ErrorKind::Transfer,
            Unauthorized(_) => ErrorKind::Authorization,
            Overflow | ReentrantCall | Json(_) | Io(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Address;

    #[test]
    fn test_error_kinds() {
        assert_eq!(MarketError::ZeroShares.kind(), ErrorKind::Validation);
        assert_eq!(MarketError::MarketNotFound(3).kind(), ErrorKind::State);
        assert_eq!(
            MarketError::Unauthorized("mallory".into()).kind(),
            ErrorKind::Authorization
        );
        let err: MarketError = TransferError::Rejected(Address::from("bob")).into();
        assert_eq!(err.kind(), ErrorKind::Transfer);
    }

    #[test]
    fn test_error_messages() {
        let err = MarketError::WrongPayment {
            expected: 30,
            attached: 29,
        };
        assert_eq!(err.to_string(), "Wrong payment: expected 30, attached 29");
    }
}
