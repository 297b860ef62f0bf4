//! Currency ledger with wager-aware accounting
//!
//! Balances, per-(owner, spender) allowances and a per-owner committed-wager
//! sum. The committed sum is a reservation: it never exceeds the owner's
//! balance nor the allowance granted to the controller, and ordinary
//! transfers can only move what is left over.
//!
//! Every operation validates completely before touching state, so a failed
//! call leaves the ledger exactly as it was.

use crate::common::traits::{StakeLedger, StakeTransfer};
use crate::common::types::{Address, Amount};
use crate::errors::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Point-in-time view of one account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub address: Address,
    pub balance: Amount,
    pub committed: Amount,
    /// Allowance granted to the ledger controller
    pub controller_allowance: Amount,
}

/// In-memory currency ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    controller: Address,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    committed: HashMap<Address, Amount>,
    total_supply: Amount,
}

impl Ledger {
    pub fn new(controller: Address) -> Self {
        Self {
            controller,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            committed: HashMap::new(),
            total_supply: 0,
        }
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Part of the balance not held by wager reservations
    pub fn unreserved_of(&self, account: Address) -> Amount {
        self.balance_of(account)
            .saturating_sub(self.committed_of(account))
    }

    pub fn account(&self, address: Address) -> AccountView {
        AccountView {
            address,
            balance: self.balance_of(address),
            committed: self.committed_of(address),
            controller_allowance: self.allowance_of(address, self.controller),
        }
    }

    fn ensure_controller(&self, caller: Address, op: &'static str) -> Result<(), LedgerError> {
        if caller != self.controller {
            warn!(caller = %caller, op, "rejected privileged ledger call");
            return Err(LedgerError::Unauthorized { caller });
        }
        Ok(())
    }

    fn ensure_unreserved(&self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let available = self.unreserved_of(account);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                account,
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Create `amount` new units for `to` (controller only)
    pub fn mint(&mut self, caller: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_controller(caller, "mint")?;
        if to.is_null() {
            return Err(LedgerError::InvalidTarget("mint recipient"));
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("mint"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("mint"))?;

        self.total_supply = supply;
        self.balances.insert(to, balance);
        debug!(to = %to, amount, "minted currency");
        Ok(())
    }

    /// Destroy `amount` of the unreserved balance of `from` (controller only)
    pub fn burn(&mut self, caller: Address, from: Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_controller(caller, "burn")?;
        if from.is_null() {
            return Err(LedgerError::InvalidTarget("burn source"));
        }
        self.ensure_unreserved(from, amount)?;

        self.balances.insert(from, self.balance_of(from) - amount);
        self.total_supply -= amount;
        debug!(from = %from, amount, "burned currency");
        Ok(())
    }

    /// Standard transfer of the sender's unreserved balance
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        if to.is_null() {
            return Err(LedgerError::InvalidTarget("transfer recipient"));
        }
        self.ensure_unreserved(from, amount)?;
        self.credit_debit(from, to, amount)
    }

    /// Set the allowance `owner` grants to `spender`.
    ///
    /// The allowance granted to the controller can never drop below the
    /// owner's committed wagers.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), LedgerError> {
        if spender.is_null() {
            return Err(LedgerError::InvalidTarget("spender"));
        }
        if spender == self.controller {
            let committed = self.committed_of(owner);
            if amount < committed {
                return Err(LedgerError::BelowCommitted {
                    owner,
                    committed,
                    requested: amount,
                });
            }
        }

        self.allowances.insert((owner, spender), amount);
        debug!(owner = %owner, spender = %spender, amount, "allowance set");
        Ok(())
    }

    /// Spend allowance to move funds out of `from`.
    ///
    /// When the controller is the spender, only the part of its allowance
    /// above the owner's committed sum is spendable.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if to.is_null() {
            return Err(LedgerError::InvalidTarget("transfer recipient"));
        }
        let allowance = self.allowance_of(from, spender);
        let spendable = if spender == self.controller {
            allowance.saturating_sub(self.committed_of(from))
        } else {
            allowance
        };
        if amount > spendable {
            return Err(LedgerError::InsufficientAllowance {
                owner: from,
                spender,
                available: spendable,
                requested: amount,
            });
        }
        self.ensure_unreserved(from, amount)?;

        self.credit_debit(from, to, amount)?;
        self.allowances.insert((from, spender), allowance - amount);
        Ok(())
    }

    fn credit_debit(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("transfer"))?;

        self.balances.insert(from, self.balance_of(from) - amount);
        self.balances.insert(to, credited);
        Ok(())
    }

    /// Accounts with a non-zero committed sum
    pub fn committed_entries(&self) -> impl Iterator<Item = (Address, Amount)> + '_ {
        self.committed
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(owner, amount)| (*owner, *amount))
    }

    /// Recompute the supply and check every reservation bound
    pub fn audit(&self) -> Result<(), LedgerError> {
        let mut sum: u128 = 0;
        for balance in self.balances.values() {
            sum += u128::from(*balance);
        }
        if sum != u128::from(self.total_supply) {
            return Err(LedgerError::InvariantViolated(format!(
                "sum of balances {} differs from total supply {}",
                sum, self.total_supply
            )));
        }

        for (owner, committed) in &self.committed {
            let balance = self.balance_of(*owner);
            if *committed > balance {
                return Err(LedgerError::InvariantViolated(format!(
                    "{} has {} committed but a balance of {}",
                    owner, committed, balance
                )));
            }
            let allowance = self.allowance_of(*owner, self.controller);
            if *committed > allowance {
                return Err(LedgerError::InvariantViolated(format!(
                    "{} has {} committed but allows the controller only {}",
                    owner, committed, allowance
                )));
            }
        }

        Ok(())
    }
}

impl StakeLedger for Ledger {
    fn controller(&self) -> Address {
        self.controller
    }

    fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn allowance_of(&self, owner: Address, spender: Address) -> Amount {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    fn committed_of(&self, owner: Address) -> Amount {
        self.committed.get(&owner).copied().unwrap_or(0)
    }

    fn reserve(&mut self, caller: Address, owner: Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_controller(caller, "reserve")?;
        let committed = self.committed_of(owner);
        let target = committed
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("reserve"))?;

        let allowance = self.allowance_of(owner, self.controller);
        if target > allowance {
            return Err(LedgerError::InsufficientAllowance {
                owner,
                spender: self.controller,
                available: allowance.saturating_sub(committed),
                requested: amount,
            });
        }
        let balance = self.balance_of(owner);
        if target > balance {
            return Err(LedgerError::InsufficientBalance {
                account: owner,
                available: balance.saturating_sub(committed),
                requested: amount,
            });
        }

        self.committed.insert(owner, target);
        debug!(owner = %owner, amount, committed = target, "reserved stake");
        Ok(())
    }

    fn release(&mut self, caller: Address, owner: Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_controller(caller, "release")?;
        let committed = self.committed_of(owner);
        if amount > committed {
            return Err(LedgerError::Underflow {
                owner,
                committed,
                requested: amount,
            });
        }

        self.committed.insert(owner, committed - amount);
        debug!(owner = %owner, amount, committed = committed - amount, "released stake");
        Ok(())
    }

    fn transfer_stake(&mut self, caller: Address, transfer: &StakeTransfer) -> Result<(), LedgerError> {
        self.ensure_controller(caller, "transfer_stake")?;
        let StakeTransfer {
            winner,
            winner_stake,
            loser,
            loser_stake,
        } = *transfer;
        if winner.is_null() || loser.is_null() {
            return Err(LedgerError::InvalidTarget("stake party"));
        }

        // Reservations to release, per account
        let loser_committed = self.committed_of(loser);
        let (loser_release, winner_release) = if winner == loser {
            let both = winner_stake
                .checked_add(loser_stake)
                .ok_or(LedgerError::Overflow("transfer_stake"))?;
            (both, 0)
        } else {
            (loser_stake, winner_stake)
        };
        if loser_release > loser_committed {
            return Err(LedgerError::Underflow {
                owner: loser,
                committed: loser_committed,
                requested: loser_release,
            });
        }
        let winner_committed = self.committed_of(winner);
        if winner != loser && winner_release > winner_committed {
            return Err(LedgerError::Underflow {
                owner: winner,
                committed: winner_committed,
                requested: winner_release,
            });
        }

        let allowance = self.allowance_of(loser, self.controller);
        if loser_stake > allowance {
            return Err(LedgerError::InsufficientAllowance {
                owner: loser,
                spender: self.controller,
                available: allowance,
                requested: loser_stake,
            });
        }
        let loser_balance = self.balance_of(loser);
        if loser_stake > loser_balance {
            return Err(LedgerError::InsufficientBalance {
                account: loser,
                available: loser_balance,
                requested: loser_stake,
            });
        }
        let winner_balance = self.balance_of(winner);
        if winner != loser && winner_balance.checked_add(loser_stake).is_none() {
            return Err(LedgerError::Overflow("transfer_stake"));
        }

        self.committed.insert(loser, loser_committed - loser_release);
        if winner != loser {
            self.committed.insert(winner, winner_committed - winner_release);
            self.balances.insert(loser, loser_balance - loser_stake);
            self.balances.insert(winner, winner_balance + loser_stake);
        }
        self.allowances
            .insert((loser, self.controller), allowance - loser_stake);

        debug!(
            winner = %winner,
            loser = %loser,
            amount = loser_stake,
            "stake transferred"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn controller() -> Address {
        Address::from_low_u64(0xC0)
    }

    fn alice() -> Address {
        Address::from_low_u64(1)
    }

    fn bob() -> Address {
        Address::from_low_u64(2)
    }

    fn funded() -> Ledger {
        let mut ledger = Ledger::new(controller());
        ledger.mint(controller(), alice(), 100).unwrap();
        ledger.mint(controller(), bob(), 100).unwrap();
        ledger
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut ledger = funded();
        ledger.transfer(alice(), bob(), 30).unwrap();
        assert_eq!(ledger.balance_of(alice()), 70);
        assert_eq!(ledger.balance_of(bob()), 130);
        assert_eq!(ledger.total_supply(), 200);
        ledger.audit().unwrap();
    }

    #[test]
    fn test_privileged_calls_require_controller() {
        let mut ledger = funded();
        assert_eq!(
            ledger.mint(alice(), alice(), 1).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            ledger.burn(alice(), alice(), 1).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            ledger.reserve(alice(), alice(), 1).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            ledger.release(bob(), alice(), 0).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_null_identifier_rejected() {
        let mut ledger = funded();
        let kinds = [
            ledger.mint(controller(), Address::ZERO, 1).unwrap_err().kind(),
            ledger.burn(controller(), Address::ZERO, 1).unwrap_err().kind(),
            ledger.transfer(alice(), Address::ZERO, 1).unwrap_err().kind(),
            ledger.approve(alice(), Address::ZERO, 1).unwrap_err().kind(),
            ledger
                .transfer_from(bob(), alice(), Address::ZERO, 1)
                .unwrap_err()
                .kind(),
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::InvalidTarget));
    }

    #[test]
    fn test_burn_more_than_balance_fails() {
        let mut ledger = funded();
        let err = ledger.burn(controller(), alice(), 101).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        ledger.burn(controller(), alice(), 100).unwrap();
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_reserve_bounded_by_allowance_and_balance() {
        let mut ledger = funded();
        let err = ledger.reserve(controller(), alice(), 20).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));

        ledger.approve(alice(), controller(), 500).unwrap();
        let err = ledger.reserve(controller(), alice(), 101).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        ledger.reserve(controller(), alice(), 60).unwrap();
        assert_eq!(ledger.committed_of(alice()), 60);
        ledger.audit().unwrap();
    }

    #[test]
    fn test_approve_below_committed_fails() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 20).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();

        let err = ledger.approve(alice(), controller(), 19).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BelowCommitted);
        assert_eq!(ledger.allowance_of(alice(), controller()), 20);

        // Other spenders are unaffected by reservations
        ledger.approve(alice(), bob(), 0).unwrap();
    }

    #[test]
    fn test_reserved_funds_cannot_be_moved() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 80).unwrap();
        ledger.approve(alice(), bob(), 100).unwrap();
        ledger.reserve(controller(), alice(), 70).unwrap();

        assert_eq!(
            ledger.transfer(alice(), bob(), 31).unwrap_err().kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            ledger.transfer_from(bob(), alice(), bob(), 31).unwrap_err().kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            ledger.burn(controller(), alice(), 31).unwrap_err().kind(),
            ErrorKind::InsufficientFunds
        );

        // The controller can only spend the allowance left above the reservation
        let err = ledger
            .transfer_from(controller(), alice(), bob(), 11)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { available: 10, .. }));
        ledger.transfer_from(controller(), alice(), bob(), 10).unwrap();
        assert_eq!(ledger.allowance_of(alice(), controller()), 70);
        ledger.audit().unwrap();
    }

    #[test]
    fn test_release_underflow() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 20).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();
        let err = ledger.release(controller(), alice(), 21).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        ledger.release(controller(), alice(), 20).unwrap();
        assert_eq!(ledger.committed_of(alice()), 0);
    }

    #[test]
    fn test_transfer_stake_between_owners() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 20).unwrap();
        ledger.approve(bob(), controller(), 20).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();
        ledger.reserve(controller(), bob(), 20).unwrap();

        ledger
            .transfer_stake(
                controller(),
                &StakeTransfer {
                    winner: alice(),
                    winner_stake: 20,
                    loser: bob(),
                    loser_stake: 20,
                },
            )
            .unwrap();

        assert_eq!(ledger.balance_of(alice()), 120);
        assert_eq!(ledger.balance_of(bob()), 80);
        assert_eq!(ledger.committed_of(alice()), 0);
        assert_eq!(ledger.committed_of(bob()), 0);
        assert_eq!(ledger.allowance_of(alice(), controller()), 20);
        assert_eq!(ledger.allowance_of(bob(), controller()), 0);
        ledger.audit().unwrap();
    }

    #[test]
    fn test_transfer_stake_same_owner() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 40).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();

        ledger
            .transfer_stake(
                controller(),
                &StakeTransfer {
                    winner: alice(),
                    winner_stake: 20,
                    loser: alice(),
                    loser_stake: 20,
                },
            )
            .unwrap();

        assert_eq!(ledger.balance_of(alice()), 100);
        assert_eq!(ledger.committed_of(alice()), 0);
        assert_eq!(ledger.allowance_of(alice(), controller()), 20);
        ledger.audit().unwrap();
    }

    #[test]
    fn test_transfer_stake_self_bet() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 20).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();

        ledger
            .transfer_stake(
                controller(),
                &StakeTransfer {
                    winner: alice(),
                    winner_stake: 0,
                    loser: alice(),
                    loser_stake: 20,
                },
            )
            .unwrap();

        assert_eq!(ledger.balance_of(alice()), 100);
        assert_eq!(ledger.committed_of(alice()), 0);
        assert_eq!(ledger.allowance_of(alice(), controller()), 0);
    }

    #[test]
    fn test_transfer_stake_validates_before_mutating() {
        let mut ledger = funded();
        ledger.approve(alice(), controller(), 20).unwrap();
        ledger.approve(bob(), controller(), 20).unwrap();
        ledger.reserve(controller(), alice(), 20).unwrap();
        ledger.reserve(controller(), bob(), 10).unwrap();

        let before = (ledger.account(alice()), ledger.account(bob()));
        let err = ledger
            .transfer_stake(
                controller(),
                &StakeTransfer {
                    winner: alice(),
                    winner_stake: 20,
                    loser: bob(),
                    loser_stake: 20,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!((ledger.account(alice()), ledger.account(bob())), before);
    }

    #[test]
    fn test_overflow_is_invalid_amount() {
        let mut ledger = Ledger::new(controller());
        ledger.mint(controller(), alice(), u64::MAX).unwrap();
        let err = ledger.mint(controller(), bob(), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(ledger.balance_of(bob()), 0);
    }
}
