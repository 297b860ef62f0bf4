//! Commit-reveal betting protocol
//!
//! Each ordered item pair `(A, B)` has at most one wager, moving through
//! `Proposed -> Committed -> Revealed` until the pair settles and both
//! records disappear. Checks always run before any mutation; the ledger's
//! own operations are themselves validate-then-apply, so a failed call
//! leaves both the book and the ledger untouched.
//!
//! Events are queued in an outbox and drained by the caller once the
//! operation has fully committed.

use crate::common::traits::{FeedingSchedule, ItemRegistry, StakeLedger, StakeTransfer};
use crate::common::types::{Address, Amount, CommitmentHash, ItemId, Secret, Timestamp};
use crate::config::WagerConfig;
use crate::errors::{LedgerError, WagerError};
use crate::wagers::commitment;
use crate::wagers::events::{EngineEvent, SettlementKind, SettlementReceipt};
use crate::wagers::state::{flip, unordered, FlipWinner, PairKey, Wager, WagerState};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

/// Timing rules for the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WagerRules {
    pub reveal_window_secs: u64,
    pub rebet_cooldown_secs: u64,
}

impl From<&WagerConfig> for WagerRules {
    fn from(config: &WagerConfig) -> Self {
        Self {
            reveal_window_secs: config.reveal_window_secs,
            rebet_cooldown_secs: config.rebet_cooldown_secs,
        }
    }
}

/// Result of a reveal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// First secret of the pair; waiting for the mirror
    Recorded,
    /// Second secret; the pair settled in the same call
    Settled(SettlementReceipt),
}

/// Arena of wagers keyed by directed pair
#[derive(Debug, Clone)]
pub struct WagerBook {
    wagers: BTreeMap<PairKey, Wager>,
    last_settled: BTreeMap<PairKey, Timestamp>,
    rules: WagerRules,
    outbox: Vec<EngineEvent>,
}

impl WagerBook {
    pub fn new(rules: WagerRules) -> Self {
        Self {
            wagers: BTreeMap::new(),
            last_settled: BTreeMap::new(),
            rules,
            outbox: Vec::new(),
        }
    }

    pub fn rules(&self) -> WagerRules {
        self.rules
    }

    pub fn wager(&self, proposer: ItemId, target: ItemId) -> Option<&Wager> {
        self.wagers.get(&(proposer, target))
    }

    pub fn wagers(&self) -> impl Iterator<Item = (&PairKey, &Wager)> {
        self.wagers.iter()
    }

    pub fn len(&self) -> usize {
        self.wagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wagers.is_empty()
    }

    /// Whether `item` is the proposer of any open wager, i.e. its owner
    /// holds a reservation for it. Being the target of someone else's
    /// wager does not count.
    pub fn has_active_wager(&self, item: ItemId) -> bool {
        self.wagers
            .range((item, ItemId::MIN)..=(item, ItemId::MAX))
            .next()
            .is_some()
    }

    /// Sum of reservations per staker, for reconciliation with the ledger
    pub fn reserved_by_staker(&self) -> HashMap<Address, Amount> {
        let mut totals: HashMap<Address, Amount> = HashMap::new();
        for wager in self.wagers.values() {
            *totals.entry(wager.staker).or_insert(0) += wager.amount;
        }
        totals
    }

    /// Drain queued events
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// A pair is locked once either side holds a commitment
    fn is_locked(&self, a: ItemId, b: ItemId) -> bool {
        let committed = |key: PairKey| {
            self.wagers
                .get(&key)
                .map(|w| w.state.is_committed())
                .unwrap_or(false)
        };
        committed((a, b)) || committed((b, a))
    }

    fn ensure_authorized<R: ItemRegistry>(
        registry: &R,
        caller: Address,
        item: ItemId,
    ) -> Result<(), WagerError> {
        if !registry.is_authorized(caller, item)? {
            return Err(WagerError::Unauthorized { caller, item });
        }
        Ok(())
    }

    fn existing(&self, proposer: ItemId, target: ItemId) -> Result<&Wager, WagerError> {
        self.wagers
            .get(&(proposer, target))
            .ok_or(WagerError::WagerNotFound { proposer, target })
    }

    /// Place a wager of `amount` from `proposer` on `target`, or change the
    /// amount of an uncommitted one
    #[allow(clippy::too_many_arguments)]
    pub fn place_bet<L, R>(
        &mut self,
        ledger: &mut L,
        registry: &R,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), WagerError>
    where
        L: StakeLedger,
        R: ItemRegistry + FeedingSchedule,
    {
        let staker = registry.owner_of(proposer)?;
        registry.owner_of(target)?;
        Self::ensure_authorized(registry, caller, proposer)?;
        if amount == 0 {
            return Err(WagerError::ZeroAmount);
        }
        if !registry.is_fed(proposer, now)? {
            return Err(WagerError::NotFed(proposer));
        }

        let existing = self.wagers.get(&(proposer, target));
        if existing.map(|w| w.state.is_committed()).unwrap_or(false) {
            return Err(WagerError::AlreadyCommitted { proposer, target });
        }
        if self.is_locked(proposer, target) {
            return Err(WagerError::PairLocked { proposer, target });
        }
        let pair = unordered(proposer, target);
        if let Some(settled_at) = self.last_settled.get(&pair) {
            let until = settled_at.saturating_add(self.rules.rebet_cooldown_secs);
            if now < until {
                return Err(WagerError::Cooldown {
                    proposer,
                    target,
                    until,
                });
            }
            self.last_settled.remove(&pair);
        }
        let previous = existing.map(|w| w.amount).unwrap_or(0);
        if amount == previous {
            return Err(WagerError::UnchangedAmount(amount));
        }

        let controller = ledger.controller();
        if amount > previous {
            ledger.reserve(controller, staker, amount - previous)?;
        } else {
            ledger.release(controller, staker, previous - amount)?;
        }

        self.wagers.insert(
            (proposer, target),
            Wager {
                amount,
                staker,
                placed_at: now,
                state: WagerState::Proposed,
            },
        );
        debug!(proposer, target, amount, previous, "bet placed");
        self.outbox.push(EngineEvent::BetPlaced {
            proposer,
            target,
            amount,
        });
        Ok(())
    }

    /// Withdraw an uncommitted wager and release its stake
    pub fn remove_bet<L, R>(
        &mut self,
        ledger: &mut L,
        registry: &R,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
    ) -> Result<(), WagerError>
    where
        L: StakeLedger,
        R: ItemRegistry,
    {
        Self::ensure_authorized(registry, caller, proposer)?;
        let wager = self.existing(proposer, target)?;
        if wager.state.is_committed() {
            return Err(WagerError::AlreadyCommitted { proposer, target });
        }
        if self.is_locked(proposer, target) {
            return Err(WagerError::PairLocked { proposer, target });
        }

        let (staker, amount) = (wager.staker, wager.amount);
        let controller = ledger.controller();
        ledger.release(controller, staker, amount)?;
        self.wagers.remove(&(proposer, target));

        debug!(proposer, target, amount, "bet removed");
        self.outbox.push(EngineEvent::BetRemoved { proposer, target });
        Ok(())
    }

    /// Store the commitment for `proposer -> target`
    pub fn commit<R: ItemRegistry>(
        &mut self,
        registry: &R,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
        commitment: CommitmentHash,
        now: Timestamp,
    ) -> Result<(), WagerError> {
        Self::ensure_authorized(registry, caller, proposer)?;
        let wager = self.existing(proposer, target)?;
        if !self.wagers.contains_key(&(target, proposer)) {
            return Err(WagerError::MirrorNotPlaced { proposer, target });
        }
        if wager.state.is_committed() {
            return Err(WagerError::AlreadyCommitted { proposer, target });
        }

        if let Some(wager) = self.wagers.get_mut(&(proposer, target)) {
            wager.state = WagerState::Committed {
                commitment,
                committed_at: now,
            };
        }
        debug!(
            proposer,
            target,
            commitment = %commitment::to_hex(&commitment),
            "bet committed"
        );
        self.outbox.push(EngineEvent::BetCommitted { proposer, target });
        Ok(())
    }

    /// Reveal the secret behind a commitment.
    ///
    /// The first reveal of a pair is only recorded. The second one decides
    /// the flip and settles both sides before returning.
    #[allow(clippy::too_many_arguments)]
    pub fn reveal<L, R>(
        &mut self,
        ledger: &mut L,
        registry: &R,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
        secret: Secret,
        now: Timestamp,
    ) -> Result<RevealOutcome, WagerError>
    where
        L: StakeLedger,
        R: ItemRegistry,
    {
        Self::ensure_authorized(registry, caller, proposer)?;
        let stored = match &self.existing(proposer, target)?.state {
            WagerState::Proposed => return Err(WagerError::NotCommitted { proposer, target }),
            WagerState::Revealed { .. } => {
                return Err(WagerError::AlreadyRevealed { proposer, target })
            }
            WagerState::Committed { commitment, .. } => *commitment,
        };
        let mirror = self
            .wagers
            .get(&(target, proposer))
            .ok_or(WagerError::MirrorNotPlaced { proposer, target })?;
        if !mirror.state.is_committed() {
            return Err(WagerError::NotCommitted {
                proposer: target,
                target: proposer,
            });
        }
        if !commitment::verify(proposer, target, &secret, &stored) {
            return Err(WagerError::HashMismatch { proposer, target });
        }

        let first_secret = match (&mirror.state, proposer == target) {
            (_, true) => Some(secret),
            (WagerState::Revealed { secret: first, .. }, false) => Some(*first),
            _ => None,
        };

        let Some(first_secret) = first_secret else {
            if let Some(wager) = self.wagers.get_mut(&(proposer, target)) {
                wager.state = WagerState::Revealed {
                    commitment: stored,
                    secret,
                    revealed_at: now,
                };
            }
            debug!(proposer, target, "bet revealed, waiting for mirror");
            self.outbox.push(EngineEvent::BetRevealed { proposer, target });
            return Ok(RevealOutcome::Recorded);
        };

        let (outcome_bit, winner_side) = flip(&first_secret, &secret);
        let (winner, loser) = match winner_side {
            FlipWinner::LastRevealer => (proposer, target),
            FlipWinner::FirstRevealer => (target, proposer),
        };
        let kind = SettlementKind::Flip {
            first_revealer: target,
            outcome_bit,
            winner_side,
        };
        self.outbox.push(EngineEvent::BetRevealed { proposer, target });
        match self.settle(ledger, winner, loser, kind, now) {
            Ok(receipt) => Ok(RevealOutcome::Settled(receipt)),
            Err(e) => {
                self.outbox.pop();
                Err(e)
            }
        }
    }

    /// Referee decision on a pair whose sides are both still open
    pub fn pay_winner<L: StakeLedger>(
        &mut self,
        ledger: &mut L,
        winner: ItemId,
        loser: ItemId,
        now: Timestamp,
    ) -> Result<SettlementReceipt, WagerError> {
        for (proposer, target) in [(winner, loser), (loser, winner)] {
            if self.existing(proposer, target)?.state != WagerState::Proposed {
                return Err(WagerError::NotProposed { proposer, target });
            }
        }
        self.settle(ledger, winner, loser, SettlementKind::Referee, now)
    }

    /// Claim the pair after the mirror failed to reveal in time
    pub fn claim_forfeit<L, R>(
        &mut self,
        ledger: &mut L,
        registry: &R,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
        now: Timestamp,
    ) -> Result<SettlementReceipt, WagerError>
    where
        L: StakeLedger,
        R: ItemRegistry,
    {
        Self::ensure_authorized(registry, caller, proposer)?;
        let revealed_at = match self.existing(proposer, target)?.state {
            WagerState::Revealed { revealed_at, .. } => revealed_at,
            _ => return Err(WagerError::NotCommitted { proposer, target }),
        };
        match self.existing(target, proposer)?.state {
            WagerState::Committed { .. } => {}
            WagerState::Proposed => {
                return Err(WagerError::NotCommitted {
                    proposer: target,
                    target: proposer,
                })
            }
            WagerState::Revealed { .. } => {
                return Err(WagerError::AlreadyRevealed {
                    proposer: target,
                    target: proposer,
                })
            }
        }
        let until = revealed_at.saturating_add(self.rules.reveal_window_secs);
        if now < until {
            return Err(WagerError::RevealWindowOpen {
                proposer,
                target,
                until,
            });
        }

        self.settle(ledger, proposer, target, SettlementKind::Forfeit, now)
    }

    /// Release every side of a pair regardless of state
    pub fn void_pair<L: StakeLedger>(
        &mut self,
        ledger: &mut L,
        a: ItemId,
        b: ItemId,
    ) -> Result<Vec<Wager>, WagerError> {
        let mut keys = vec![(a, b)];
        if a != b {
            keys.push((b, a));
        }
        keys.retain(|key| self.wagers.contains_key(key));
        if keys.is_empty() {
            return Err(WagerError::WagerNotFound {
                proposer: a,
                target: b,
            });
        }

        let mut releases: HashMap<Address, Amount> = HashMap::new();
        for key in &keys {
            let wager = &self.wagers[key];
            *releases.entry(wager.staker).or_insert(0) += wager.amount;
        }
        for (staker, amount) in &releases {
            let committed = ledger.committed_of(*staker);
            if *amount > committed {
                return Err(LedgerError::Underflow {
                    owner: *staker,
                    committed,
                    requested: *amount,
                }
                .into());
            }
        }

        let controller = ledger.controller();
        for (staker, amount) in releases {
            ledger.release(controller, staker, amount)?;
        }
        let mut voided = Vec::with_capacity(keys.len());
        for (proposer, target) in keys {
            if let Some(wager) = self.wagers.remove(&(proposer, target)) {
                voided.push(wager);
            }
            self.outbox.push(EngineEvent::BetRemoved { proposer, target });
        }
        info!(a, b, sides = voided.len(), "pair voided");
        Ok(voided)
    }

    /// Release both reservations, pay the loser's stake to the winner and
    /// clear the pair
    fn settle<L: StakeLedger>(
        &mut self,
        ledger: &mut L,
        winner: ItemId,
        loser: ItemId,
        kind: SettlementKind,
        now: Timestamp,
    ) -> Result<SettlementReceipt, WagerError> {
        let won = self.existing(winner, loser)?;
        let lost = self.existing(loser, winner)?;
        let transfer = if winner == loser {
            StakeTransfer {
                winner: lost.staker,
                winner_stake: 0,
                loser: lost.staker,
                loser_stake: lost.amount,
            }
        } else {
            StakeTransfer {
                winner: won.staker,
                winner_stake: won.amount,
                loser: lost.staker,
                loser_stake: lost.amount,
            }
        };

        let controller = ledger.controller();
        ledger.transfer_stake(controller, &transfer)?;
        self.wagers.remove(&(winner, loser));
        self.wagers.remove(&(loser, winner));
        if self.rules.rebet_cooldown_secs > 0 {
            self.last_settled.insert(unordered(winner, loser), now);
        }

        let receipt = SettlementReceipt {
            id: Uuid::new_v4(),
            winner_item: winner,
            loser_item: loser,
            winner: transfer.winner,
            loser: transfer.loser,
            amount: transfer.loser_stake,
            kind,
            settled_at: now,
        };
        info!(
            winner,
            loser,
            amount = receipt.amount,
            receipt = %receipt.id,
            "pair settled"
        );
        self.outbox.push(EngineEvent::from(&receipt));
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::ledger::Ledger;
    use crate::registry::{FeedingPolicy, Registry};
    use crate::wagers::commitment::commitment_for;

    const RULES: WagerRules = WagerRules {
        reveal_window_secs: 100,
        rebet_cooldown_secs: 0,
    };

    struct Table {
        ledger: Ledger,
        registry: Registry,
        book: WagerBook,
    }

    fn engine_address() -> Address {
        Address::from_low_u64(0xE0)
    }

    fn alice() -> Address {
        Address::from_low_u64(1)
    }

    fn bob() -> Address {
        Address::from_low_u64(2)
    }

    /// Item 0 belongs to alice, item 1 to bob; both hold 100 and allow the
    /// engine 100
    fn table() -> Table {
        let mut ledger = Ledger::new(engine_address());
        let mut registry = Registry::new(FeedingPolicy {
            cost: 20,
            interval_secs: 1_000,
        });
        for owner in [alice(), bob()] {
            registry.mint(owner, "bear", 0, 0).unwrap();
            ledger.mint(engine_address(), owner, 100).unwrap();
            ledger.approve(owner, engine_address(), 100).unwrap();
        }
        Table {
            ledger,
            registry,
            book: WagerBook::new(RULES),
        }
    }

    impl Table {
        fn place(&mut self, caller: Address, a: ItemId, b: ItemId, amount: Amount) -> Result<(), WagerError> {
            self.book
                .place_bet(&mut self.ledger, &self.registry, caller, a, b, amount, 1)
        }

        fn commit(&mut self, caller: Address, a: ItemId, b: ItemId, secret: u64) -> Result<(), WagerError> {
            let hash = commitment_for(a, b, &Secret::from(secret));
            self.book.commit(&self.registry, caller, a, b, hash, 1)
        }

        fn reveal(&mut self, caller: Address, a: ItemId, b: ItemId, secret: u64, now: Timestamp) -> Result<RevealOutcome, WagerError> {
            self.book.reveal(
                &mut self.ledger,
                &self.registry,
                caller,
                a,
                b,
                Secret::from(secret),
                now,
            )
        }
    }

    #[test]
    fn test_place_bet_reserves_and_adjusts() {
        let mut t = table();
        t.place(alice(), 0, 1, 30).unwrap();
        assert_eq!(t.ledger.committed_of(alice()), 30);

        t.place(alice(), 0, 1, 10).unwrap();
        assert_eq!(t.ledger.committed_of(alice()), 10);

        let err = t.place(alice(), 0, 1, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(t.place(alice(), 0, 1, 0).unwrap_err().kind(), ErrorKind::InvalidAmount);

        let events = t.book.take_events();
        assert_eq!(events.len(), 2);
        assert!(t.book.take_events().is_empty());
    }

    #[test]
    fn test_place_bet_checks_existence_then_authorization() {
        let mut t = table();
        assert_eq!(t.place(alice(), 0, 9, 10).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(t.place(alice(), 9, 0, 10).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(t.place(bob(), 0, 1, 10).unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_place_bet_beyond_allowance_or_balance() {
        let mut t = table();
        let err = t.place(alice(), 0, 1, 101).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        t.ledger.approve(bob(), engine_address(), 500).unwrap();
        let err = t.place(bob(), 1, 0, 101).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(t.book.is_empty());
    }

    #[test]
    fn test_hungry_item_cannot_bet() {
        let mut t = table();
        let err = t
            .book
            .place_bet(&mut t.ledger, &t.registry, alice(), 0, 1, 10, 5_000)
            .unwrap_err();
        assert_eq!(err, WagerError::NotFed(0));
    }

    #[test]
    fn test_commit_requires_mirror() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        let err = t.commit(alice(), 0, 1, 5).unwrap_err();
        assert!(matches!(err, WagerError::MirrorNotPlaced { .. }));

        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(alice(), 0, 1, 5).unwrap();
        let err = t.commit(alice(), 0, 1, 6).unwrap_err();
        assert!(matches!(err, WagerError::AlreadyCommitted { .. }));
    }

    #[test]
    fn test_commit_locks_pair() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(alice(), 0, 1, 5).unwrap();

        let remove = t
            .book
            .remove_bet(&mut t.ledger, &t.registry, alice(), 0, 1)
            .unwrap_err();
        assert_eq!(remove.kind(), ErrorKind::InvalidState);

        // Bob has not committed, but the pair is locked for him too
        let err = t.place(bob(), 1, 0, 30).unwrap_err();
        assert!(matches!(err, WagerError::PairLocked { .. }));
        let err = t
            .book
            .remove_bet(&mut t.ledger, &t.registry, bob(), 1, 0)
            .unwrap_err();
        assert!(matches!(err, WagerError::PairLocked { .. }));
    }

    #[test]
    fn test_reveal_requires_both_commitments() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(alice(), 0, 1, 5).unwrap();

        let err = t.reveal(alice(), 0, 1, 5, 2).unwrap_err();
        assert!(matches!(err, WagerError::NotCommitted { proposer: 1, target: 0 }));
        let err = t.reveal(bob(), 1, 0, 5, 2).unwrap_err();
        assert!(matches!(err, WagerError::NotCommitted { proposer: 1, target: 0 }));
    }

    #[test]
    fn test_reveal_hash_mismatch() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(alice(), 0, 1, 5).unwrap();
        t.commit(bob(), 1, 0, 6).unwrap();

        let err = t.reveal(alice(), 0, 1, 6, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HashMismatch);
        assert!(!t.book.wager(0, 1).unwrap().state.is_revealed());
    }

    #[test]
    fn test_second_reveal_settles() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(alice(), 0, 1, 2).unwrap();
        t.commit(bob(), 1, 0, 3).unwrap();

        assert_eq!(t.reveal(alice(), 0, 1, 2, 2).unwrap(), RevealOutcome::Recorded);
        let err = t.reveal(alice(), 0, 1, 2, 2).unwrap_err();
        assert!(matches!(err, WagerError::AlreadyRevealed { .. }));

        // 2 XOR 3 = 1 is odd, so the last revealer (bob's item) wins
        let receipt = match t.reveal(bob(), 1, 0, 3, 3).unwrap() {
            RevealOutcome::Settled(receipt) => receipt,
            other => panic!("expected settlement, got {:?}", other),
        };
        assert_eq!((receipt.winner_item, receipt.loser_item), (1, 0));
        assert_eq!(receipt.winner, bob());
        assert_eq!(t.ledger.balance_of(bob()), 120);
        assert_eq!(t.ledger.balance_of(alice()), 80);
        assert_eq!(t.ledger.committed_of(alice()), 0);
        assert_eq!(t.ledger.committed_of(bob()), 0);
        assert!(t.book.is_empty());
        t.ledger.audit().unwrap();
    }

    #[test]
    fn test_self_bet_settles_on_reveal() {
        let mut t = table();
        t.place(alice(), 0, 0, 20).unwrap();
        t.commit(alice(), 0, 0, 9).unwrap();
        let outcome = t.reveal(alice(), 0, 0, 9, 2).unwrap();
        assert!(matches!(outcome, RevealOutcome::Settled(_)));
        assert_eq!(t.ledger.balance_of(alice()), 100);
        assert_eq!(t.ledger.committed_of(alice()), 0);
        assert_eq!(t.ledger.allowance_of(alice(), engine_address()), 80);
    }

    #[test]
    fn test_pay_winner_and_idempotence() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 30).unwrap();

        let receipt = t.book.pay_winner(&mut t.ledger, 0, 1, 5).unwrap();
        assert_eq!(receipt.amount, 30);
        assert_eq!(t.ledger.balance_of(alice()), 130);
        assert_eq!(t.ledger.balance_of(bob()), 70);

        let err = t.book.pay_winner(&mut t.ledger, 0, 1, 6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_pay_winner_rejects_committed_pairs() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(bob(), 1, 0, 4).unwrap();
        let err = t.book.pay_winner(&mut t.ledger, 0, 1, 5).unwrap_err();
        assert!(matches!(err, WagerError::NotProposed { proposer: 1, target: 0 }));
    }

    #[test]
    fn test_claim_forfeit_after_window() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.commit(alice(), 0, 1, 2).unwrap();
        t.commit(bob(), 1, 0, 3).unwrap();
        t.reveal(alice(), 0, 1, 2, 10).unwrap();

        let early = t
            .book
            .claim_forfeit(&mut t.ledger, &t.registry, alice(), 0, 1, 109)
            .unwrap_err();
        assert!(matches!(early, WagerError::RevealWindowOpen { until: 110, .. }));

        let receipt = t
            .book
            .claim_forfeit(&mut t.ledger, &t.registry, alice(), 0, 1, 110)
            .unwrap();
        assert_eq!(receipt.kind, SettlementKind::Forfeit);
        assert_eq!(t.ledger.balance_of(alice()), 120);
    }

    #[test]
    fn test_void_pair_releases_everything() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 25).unwrap();
        t.commit(alice(), 0, 1, 2).unwrap();
        t.book.take_events();

        let voided = t.book.void_pair(&mut t.ledger, 1, 0).unwrap();
        assert_eq!(voided.len(), 2);
        assert_eq!(t.ledger.committed_of(alice()), 0);
        assert_eq!(t.ledger.committed_of(bob()), 0);
        assert_eq!(t.book.take_events().len(), 2);

        let err = t.book.void_pair(&mut t.ledger, 0, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_rebet_cooldown() {
        let mut t = table();
        t.book = WagerBook::new(WagerRules {
            rebet_cooldown_secs: 50,
            ..RULES
        });
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.book.pay_winner(&mut t.ledger, 0, 1, 10).unwrap();

        let err = t
            .book
            .place_bet(&mut t.ledger, &t.registry, bob(), 1, 0, 10, 59)
            .unwrap_err();
        assert!(matches!(err, WagerError::Cooldown { until: 60, .. }));
        t.book
            .place_bet(&mut t.ledger, &t.registry, bob(), 1, 0, 10, 60)
            .unwrap();
    }

    #[test]
    fn test_active_wager_tracks_proposers_only() {
        let mut t = table();
        assert!(!t.book.has_active_wager(0));
        t.place(alice(), 0, 1, 20).unwrap();
        assert!(t.book.has_active_wager(0));
        assert!(!t.book.has_active_wager(1));
        assert_eq!(t.book.reserved_by_staker()[&alice()], 20);

        t.place(bob(), 1, 0, 20).unwrap();
        assert!(t.book.has_active_wager(1));
    }

    #[test]
    fn test_settlement_not_remembered_without_cooldown() {
        let mut t = table();
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.book.pay_winner(&mut t.ledger, 0, 1, 10).unwrap();
        assert!(t.book.last_settled.is_empty());
    }

    #[test]
    fn test_expired_cooldown_is_forgotten() {
        let mut t = table();
        t.book = WagerBook::new(WagerRules {
            rebet_cooldown_secs: 50,
            ..RULES
        });
        t.place(alice(), 0, 1, 20).unwrap();
        t.place(bob(), 1, 0, 20).unwrap();
        t.book.pay_winner(&mut t.ledger, 0, 1, 10).unwrap();
        assert_eq!(t.book.last_settled.len(), 1);

        t.book
            .place_bet(&mut t.ledger, &t.registry, alice(), 0, 1, 5, 60)
            .unwrap();
        assert!(t.book.last_settled.is_empty());
    }
}
