//! Pairstake engine
//!
//! Owns the currency ledger, the item registry and the wager book behind a
//! single mutex. Every public operation runs start to finish under that
//! lock; the events it produced are published on a broadcast channel only
//! after the lock has been released, so subscribers never observe a
//! half-applied operation and cannot re-enter the engine mid-transition.

use crate::common::clock::SystemClock;
use crate::common::traits::{Clock, FeedingSchedule, ItemRegistry, StakeLedger};
use crate::common::types::{Address, Amount, CommitmentHash, ItemId, Secret, Timestamp};
use crate::config::{EconomyConfig, PairstakeConfig};
use crate::errors::{LedgerError, PairstakeResult, RegistryError, RoleError};
use crate::ledger::{AccountView, Ledger};
use crate::registry::{FeedingPolicy, ItemMetadata, Registry};
use crate::wagers::{EngineEvent, RevealOutcome, SettlementReceipt, Wager, WagerBook, WagerRules};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Privileged roles held by a single account each
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Decides open pairs and voids abandoned ones
    Referee,
    /// Mints items and currency
    Minter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Referee => "referee",
            Role::Minter => "minter",
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Roles {
    referee: Address,
    minter: Address,
}

impl Roles {
    fn holder(&self, role: Role) -> Address {
        match role {
            Role::Referee => self.referee,
            Role::Minter => self.minter,
        }
    }

    fn ensure(&self, role: Role, caller: Address) -> Result<(), RoleError> {
        if self.holder(role) != caller {
            warn!(caller = %caller, role = role.as_str(), "rejected privileged call");
            return Err(RoleError::NotHolder {
                role: role.as_str(),
                caller,
            });
        }
        Ok(())
    }
}

struct EngineState {
    ledger: Ledger,
    registry: Registry,
    book: WagerBook,
    roles: Roles,
    outbox: Vec<EngineEvent>,
}

impl EngineState {
    /// Ledger invariants plus agreement between the book and the ledger
    fn audit(&self) -> Result<(), LedgerError> {
        self.ledger.audit()?;

        let reserved = self.book.reserved_by_staker();
        let mut ledger_side = 0usize;
        for (owner, committed) in self.ledger.committed_entries() {
            ledger_side += 1;
            let booked = reserved.get(&owner).copied().unwrap_or(0);
            if booked != committed {
                return Err(LedgerError::InvariantViolated(format!(
                    "{} has {} committed on the ledger but {} in open wagers",
                    owner, committed, booked
                )));
            }
        }
        let booked_side = reserved.values().filter(|amount| **amount > 0).count();
        if booked_side != ledger_side {
            return Err(LedgerError::InvariantViolated(
                "open wagers reference stakes missing from the ledger".to_string(),
            ));
        }
        Ok(())
    }
}

/// The wagering engine
pub struct Engine {
    address: Address,
    economy: EconomyConfig,
    state: Mutex<EngineState>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Build an engine on the system clock with a fresh random address
    pub fn new(config: &PairstakeConfig) -> PairstakeResult<Self> {
        Self::with_clock(config, Address::random(), Arc::new(SystemClock::new()))
    }

    /// Build an engine acting as `address` and reading time from `clock`
    pub fn with_clock(
        config: &PairstakeConfig,
        address: Address,
        clock: Arc<dyn Clock>,
    ) -> PairstakeResult<Self> {
        config.validate()?;
        if address.is_null() {
            return Err(LedgerError::InvalidTarget("engine address").into());
        }

        let (events, _) = broadcast::channel(config.wagers.event_buffer);
        let state = EngineState {
            ledger: Ledger::new(address),
            registry: Registry::new(FeedingPolicy::from(&config.economy)),
            book: WagerBook::new(WagerRules::from(&config.wagers)),
            roles: Roles {
                referee: config.roles.referee,
                minter: config.roles.minter,
            },
            outbox: Vec::new(),
        };

        info!(
            engine = %address,
            referee = %config.roles.referee,
            minter = %config.roles.minter,
            "engine initialized"
        );
        Ok(Self {
            address,
            economy: config.economy.clone(),
            state: Mutex::new(state),
            clock,
            events,
        })
    }

    /// The engine's own account: ledger controller and the spender owners
    /// approve for wagering
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Run a mutating operation under the lock, then publish its events
    fn execute<T>(
        &self,
        op: impl FnOnce(&mut EngineState, Timestamp) -> PairstakeResult<T>,
    ) -> PairstakeResult<T> {
        let now = self.clock.now();
        let (result, events) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let result = op(&mut *state, now);
            let mut events = std::mem::take(&mut state.outbox);
            events.append(&mut state.book.take_events());
            if result.is_err() {
                events.clear();
            }
            debug_assert!(
                state.audit().is_ok(),
                "engine invariants broken: {:?}",
                state.audit()
            );
            (result, events)
        };

        for event in events {
            // No subscribers is not an error
            let _ = self.events.send(event);
        }
        result
    }

    fn read<T>(&self, op: impl FnOnce(&EngineState, Timestamp) -> T) -> T {
        let now = self.clock.now();
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        op(&*state, now)
    }

    // ---- Roles -----------------------------------------------------------

    pub fn role_holder(&self, role: Role) -> Address {
        self.read(|state, _| state.roles.holder(role))
    }

    /// Hand `role` to `new_holder`; only the current holder may do this
    pub fn transfer_role(&self, caller: Address, role: Role, new_holder: Address) -> PairstakeResult<()> {
        self.execute(|state, _| {
            state.roles.ensure(role, caller)?;
            if new_holder.is_null() {
                return Err(RoleError::NullHolder(role.as_str()).into());
            }
            match role {
                Role::Referee => state.roles.referee = new_holder,
                Role::Minter => state.roles.minter = new_holder,
            }
            info!(role = role.as_str(), from = %caller, to = %new_holder, "role transferred");
            state.outbox.push(EngineEvent::RoleTransferred {
                role: role.as_str().to_string(),
                from: caller,
                to: new_holder,
            });
            Ok(())
        })
    }

    // ---- Currency --------------------------------------------------------

    pub fn mint_currency(&self, caller: Address, to: Address, amount: Amount) -> PairstakeResult<()> {
        let controller = self.address;
        self.execute(|state, _| {
            state.roles.ensure(Role::Minter, caller)?;
            state.ledger.mint(controller, to, amount)?;
            Ok(())
        })
    }

    pub fn transfer_currency(&self, caller: Address, to: Address, amount: Amount) -> PairstakeResult<()> {
        self.execute(|state, _| Ok(state.ledger.transfer(caller, to, amount)?))
    }

    pub fn approve_currency(&self, caller: Address, spender: Address, amount: Amount) -> PairstakeResult<()> {
        self.execute(|state, _| Ok(state.ledger.approve(caller, spender, amount)?))
    }

    pub fn transfer_currency_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> PairstakeResult<()> {
        self.execute(|state, _| Ok(state.ledger.transfer_from(caller, from, to, amount)?))
    }

    pub fn balance_of(&self, account: Address) -> Amount {
        self.read(|state, _| state.ledger.balance_of(account))
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> Amount {
        self.read(|state, _| state.ledger.allowance_of(owner, spender))
    }

    pub fn committed_of(&self, owner: Address) -> Amount {
        self.read(|state, _| state.ledger.committed_of(owner))
    }

    pub fn total_supply(&self) -> Amount {
        self.read(|state, _| state.ledger.total_supply())
    }

    pub fn account(&self, address: Address) -> AccountView {
        self.read(|state, _| state.ledger.account(address))
    }

    // ---- Items -----------------------------------------------------------

    /// Mint a new item to `owner` together with the starting currency
    /// balance
    pub fn mint_item(
        &self,
        caller: Address,
        owner: Address,
        name: &str,
        genes: u64,
    ) -> PairstakeResult<ItemId> {
        let controller = self.address;
        let start_balance = self.economy.start_balance;
        self.execute(|state, now| {
            state.roles.ensure(Role::Minter, caller)?;
            if owner.is_null() {
                return Err(RegistryError::InvalidTarget("item owner").into());
            }
            state.ledger.mint(controller, owner, start_balance)?;
            let item = state.registry.mint(owner, name, genes, now)?;
            info!(item, owner = %owner, item_name = name, "item minted");
            state.outbox.push(EngineEvent::ItemMinted { item, owner });
            Ok(item)
        })
    }

    pub fn owner_of(&self, item: ItemId) -> PairstakeResult<Address> {
        self.read(|state, _| Ok(state.registry.owner_of(item)?))
    }

    pub fn item_count(&self) -> u64 {
        self.read(|state, _| state.registry.item_count())
    }

    pub fn item_metadata(&self, item: ItemId) -> PairstakeResult<ItemMetadata> {
        self.read(|state, _| Ok(state.registry.metadata(item)?.clone()))
    }

    pub fn items_of(&self, owner: Address) -> Vec<ItemId> {
        self.read(|state, _| state.registry.items_of(owner))
    }

    pub fn item_exists(&self, item: ItemId) -> bool {
        self.read(|state, _| state.registry.exists(item))
    }

    pub fn balance_of_items(&self, owner: Address) -> u64 {
        self.read(|state, _| state.registry.balance_of_items(owner))
    }

    pub fn get_approved(&self, item: ItemId) -> PairstakeResult<Option<Address>> {
        self.read(|state, _| Ok(state.registry.get_approved(item)?))
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.read(|state, _| state.registry.is_approved_for_all(owner, operator))
    }

    pub fn approve_item(&self, caller: Address, spender: Address, item: ItemId) -> PairstakeResult<()> {
        self.execute(|state, _| Ok(state.registry.approve_item(caller, spender, item)?))
    }

    pub fn set_approval_for_all(&self, caller: Address, operator: Address, approved: bool) -> PairstakeResult<()> {
        self.execute(|state, _| Ok(state.registry.set_approval_for_all(caller, operator, approved)?))
    }

    /// Transfer an item; refused while the item proposes an open wager
    pub fn transfer_item(&self, caller: Address, from: Address, to: Address, item: ItemId) -> PairstakeResult<()> {
        self.execute(|state, _| {
            state.registry.owner_of(item)?;
            if state.book.has_active_wager(item) {
                return Err(RegistryError::ActiveWager(item).into());
            }
            state.registry.transfer_item(caller, from, to, item)?;
            state.outbox.push(EngineEvent::ItemTransferred { item, from, to });
            Ok(())
        })
    }

    pub fn meals_needed(&self, item: ItemId) -> PairstakeResult<u64> {
        self.read(|state, now| Ok(state.registry.meals_needed(item, now)?))
    }

    pub fn is_fed(&self, item: ItemId) -> PairstakeResult<bool> {
        self.read(|state, now| Ok(state.registry.is_fed(item, now)?))
    }

    /// Pay for `amount / feeding_cost` meals out of the caller's unreserved
    /// balance
    pub fn feed(&self, caller: Address, item: ItemId, amount: Amount) -> PairstakeResult<Timestamp> {
        let controller = self.address;
        self.execute(|state, now| {
            let plan = state.registry.plan_meal(caller, item, amount, now)?;
            state.ledger.burn(controller, plan.payer, plan.amount)?;
            state.registry.apply_meal(&plan)?;
            debug!(item, meals = plan.meals, "fed");
            state.outbox.push(EngineEvent::ItemFed {
                item,
                last_fed: plan.last_fed,
            });
            Ok(plan.last_fed)
        })
    }

    // ---- Wagers ----------------------------------------------------------

    pub fn place_bet(&self, caller: Address, proposer: ItemId, target: ItemId, amount: Amount) -> PairstakeResult<()> {
        self.execute(|state, now| {
            let EngineState {
                ledger, registry, book, ..
            } = state;
            Ok(book.place_bet(ledger, &*registry, caller, proposer, target, amount, now)?)
        })
    }

    pub fn remove_bet(&self, caller: Address, proposer: ItemId, target: ItemId) -> PairstakeResult<()> {
        self.execute(|state, _| {
            let EngineState {
                ledger, registry, book, ..
            } = state;
            Ok(book.remove_bet(ledger, &*registry, caller, proposer, target)?)
        })
    }

    pub fn commit(
        &self,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
        commitment: CommitmentHash,
    ) -> PairstakeResult<()> {
        self.execute(|state, now| {
            Ok(state
                .book
                .commit(&state.registry, caller, proposer, target, commitment, now)?)
        })
    }

    pub fn reveal(
        &self,
        caller: Address,
        proposer: ItemId,
        target: ItemId,
        secret: Secret,
    ) -> PairstakeResult<RevealOutcome> {
        self.execute(|state, now| {
            let EngineState {
                ledger, registry, book, ..
            } = state;
            Ok(book.reveal(ledger, &*registry, caller, proposer, target, secret, now)?)
        })
    }

    /// Referee settlement of an uncommitted pair
    pub fn pay_winner(&self, caller: Address, winner: ItemId, loser: ItemId) -> PairstakeResult<SettlementReceipt> {
        self.execute(|state, now| {
            state.roles.ensure(Role::Referee, caller)?;
            Ok(state.book.pay_winner(&mut state.ledger, winner, loser, now)?)
        })
    }

    pub fn claim_forfeit(&self, caller: Address, proposer: ItemId, target: ItemId) -> PairstakeResult<SettlementReceipt> {
        self.execute(|state, now| {
            let EngineState {
                ledger, registry, book, ..
            } = state;
            Ok(book.claim_forfeit(ledger, &*registry, caller, proposer, target, now)?)
        })
    }

    /// Referee cancellation of every side of a pair
    pub fn void_pair(&self, caller: Address, a: ItemId, b: ItemId) -> PairstakeResult<Vec<Wager>> {
        self.execute(|state, _| {
            state.roles.ensure(Role::Referee, caller)?;
            Ok(state.book.void_pair(&mut state.ledger, a, b)?)
        })
    }

    pub fn wager(&self, proposer: ItemId, target: ItemId) -> Option<Wager> {
        self.read(|state, _| state.book.wager(proposer, target).cloned())
    }

    pub fn open_wagers(&self) -> usize {
        self.read(|state, _| state.book.len())
    }

    /// Full consistency check of ledger and book
    pub fn audit(&self) -> PairstakeResult<()> {
        self.read(|state, _| Ok(state.audit()?))
    }
}
