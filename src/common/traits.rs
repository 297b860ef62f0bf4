//! Shared traits and interfaces
//!
//! The betting protocol talks to the item registry, the feeding schedule,
//! the currency ledger and the clock only through these traits, so each
//! collaborator can be swapped for a fake in tests.

use crate::common::types::{Address, Amount, ItemId, Timestamp};
use crate::errors::{LedgerError, RegistryError};
use serde::{Deserialize, Serialize};

/// Ownership and authorization lookups for collectible items
pub trait ItemRegistry {
    /// Current owner of `item`, or `NotFound` for ids that were never minted
    fn owner_of(&self, item: ItemId) -> Result<Address, RegistryError>;

    fn exists(&self, item: ItemId) -> bool;

    /// Whether `caller` is the owner, the approved spender or an operator
    /// of the owner
    fn is_authorized(&self, caller: Address, item: ItemId) -> Result<bool, RegistryError>;
}

/// Timed-consumption status of items
pub trait FeedingSchedule {
    fn is_fed(&self, item: ItemId, now: Timestamp) -> Result<bool, RegistryError>;
}

/// One settlement instruction for the ledger.
///
/// Both reservations are released and `loser_stake` moves from `loser` to
/// `winner`. For a self-bet `loser == winner` and `winner_stake` is zero
/// because the whole reservation is carried by `loser_stake`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTransfer {
    pub winner: Address,
    pub winner_stake: Amount,
    pub loser: Address,
    pub loser_stake: Amount,
}

/// Wager-aware currency accounting consumed by the betting protocol
pub trait StakeLedger {
    /// The privileged account allowed to reserve, release and settle
    fn controller(&self) -> Address;

    fn balance_of(&self, account: Address) -> Amount;

    fn allowance_of(&self, owner: Address, spender: Address) -> Amount;

    fn committed_of(&self, owner: Address) -> Amount;

    fn reserve(&mut self, caller: Address, owner: Address, amount: Amount) -> Result<(), LedgerError>;

    fn release(&mut self, caller: Address, owner: Address, amount: Amount) -> Result<(), LedgerError>;

    fn transfer_stake(&mut self, caller: Address, transfer: &StakeTransfer) -> Result<(), LedgerError>;
}

/// Source of the current time in whole seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
