//! # Value Custody
//!
//! The engine holds and moves a single native value unit. The hosting environment
//! provides the actual `transfer(to, amount) -> success` primitive through
//! [`ValueTransfer`]; [`InMemoryVault`] is the in-process host used by the CLI,
//! the demo and the tests.
//!
//! Every implementation keeps a journal so an operation that must be all-or-nothing
//! can roll back the transfers it already made.

use crate::ledger::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Failure of a single value transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The recipient refused the value
    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    /// The sender does not hold enough value
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Amount, available: Amount },
}

/// Position in a vault journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Host primitive for moving native value in and out of the engine.
pub trait ValueTransfer {
    /// Accept value attached to an incoming call from `from`.
    fn deposit(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError>;

    /// Send value held by the engine to `to`.
    fn transfer(&mut self, to: &Address, amount: Amount) -> Result<(), TransferError>;

    /// Total value currently held by the engine.
    fn held(&self) -> Amount;

    /// Mark the start of an all-or-nothing section.
    fn checkpoint(&self) -> Checkpoint;

    /// Undo every movement recorded since `checkpoint`.
    fn rollback(&mut self, checkpoint: Checkpoint);

    /// Make every movement since `checkpoint` permanent.
    fn commit(&mut self, checkpoint: Checkpoint);
}

#[derive(Debug, Clone)]
enum Movement {
    Deposit { from: Address, amount: Amount },
    Transfer { to: Address, amount: Amount },
}

/// In-memory account table standing in for the hosting execution environment.
///
/// Every identity has a spendable balance; the engine's own holdings are tracked in
/// `held`. Recipients can be flagged to reject incoming value, which is how
/// uncooperative payees are simulated.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct InMemoryVault {
    held: Amount,
    balances: BTreeMap<Address, Amount>,
    rejecting: BTreeSet<Address>,
    #[serde(skip)]
    journal: Vec<Movement>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an identity out of thin air (faucet).
    pub fn fund(&mut self, account: &Address, amount: Amount) {
        *self.balances.entry(account.clone()).or_default() += amount;
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Make `account` refuse every incoming transfer.
    pub fn reject(&mut self, account: &Address) {
        self.rejecting.insert(account.clone());
    }

    /// Let `account` receive transfers again.
    pub fn accept(&mut self, account: &Address) {
        self.rejecting.remove(account);
    }

    pub fn is_rejecting(&self, account: &Address) -> bool {
        self.rejecting.contains(account)
    }

    fn undo(&mut self, movement: Movement) {
        match movement {
            Movement::Deposit { from, amount } => {
                self.held -= amount;
                *self.balances.entry(from).or_default() += amount;
            }
            Movement::Transfer { to, amount } => {
                self.held += amount;
                if let Some(balance) = self.balances.get_mut(&to) {
                    *balance -= amount;
                }
            }
        }
    }
}

impl ValueTransfer for InMemoryVault {
    fn deposit(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        self.balances.insert(from.clone(), available - amount);
        self.held += amount;
        self.journal.push(Movement::Deposit {
            from: from.clone(),
            amount,
        });
        Ok(())
    }

    fn transfer(&mut self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        if self.rejecting.contains(to) {
            return Err(TransferError::Rejected(to.clone()));
        }
        if self.held < amount {
            return Err(TransferError::InsufficientFunds {
                needed: amount,
                available: self.held,
            });
        }
        self.held -= amount;
        *self.balances.entry(to.clone()).or_default() += amount;
        self.journal.push(Movement::Transfer {
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    fn held(&self) -> Amount {
        self.held
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            if let Some(movement) = self.journal.pop() {
                self.undo(movement);
            }
        }
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.journal.truncate(checkpoint.0);
    }
}
