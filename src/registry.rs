//! Collectible item registry and feeding schedule
//!
//! Sequentially numbered items with a single owner each, per-item approvals,
//! owner-wide operators and a timed-consumption counter. Items that go
//! unfed for a full interval are hungry and cannot be wagered.

use crate::common::traits::{FeedingSchedule, ItemRegistry};
use crate::common::types::{Address, Amount, ItemId, Timestamp};
use crate::config::EconomyConfig;
use crate::errors::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Descriptive data stored with every item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
    pub genes: u64,
    pub birth_time: Timestamp,
    pub last_fed: Timestamp,
}

#[derive(Clone, Debug)]
struct ItemRecord {
    owner: Address,
    approved: Option<Address>,
    metadata: ItemMetadata,
}

/// Cost and cadence of feeding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingPolicy {
    pub cost: Amount,
    pub interval_secs: u64,
}

impl From<&EconomyConfig> for FeedingPolicy {
    fn from(economy: &EconomyConfig) -> Self {
        Self {
            cost: economy.feeding_cost,
            interval_secs: economy.feeding_interval_secs,
        }
    }
}

/// A validated feeding, ready to apply once the currency has been burned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MealPlan {
    pub item: ItemId,
    pub payer: Address,
    pub amount: Amount,
    pub meals: u64,
    pub last_fed: Timestamp,
}

/// In-memory item registry
#[derive(Debug, Clone)]
pub struct Registry {
    items: Vec<ItemRecord>,
    operators: HashSet<(Address, Address)>,
    feeding: FeedingPolicy,
}

impl Registry {
    pub fn new(feeding: FeedingPolicy) -> Self {
        Self {
            items: Vec::new(),
            operators: HashSet::new(),
            feeding,
        }
    }

    pub fn feeding_policy(&self) -> FeedingPolicy {
        self.feeding
    }

    /// Number of items ever minted; ids below this exist
    pub fn item_count(&self) -> u64 {
        self.items.len() as u64
    }

    fn record(&self, item: ItemId) -> Result<&ItemRecord, RegistryError> {
        usize::try_from(item)
            .ok()
            .and_then(|idx| self.items.get(idx))
            .ok_or(RegistryError::NotFound(item))
    }

    fn record_mut(&mut self, item: ItemId) -> Result<&mut ItemRecord, RegistryError> {
        usize::try_from(item)
            .ok()
            .and_then(|idx| self.items.get_mut(idx))
            .ok_or(RegistryError::NotFound(item))
    }

    /// Register a new item born (and fed) at `now`
    pub fn mint(
        &mut self,
        owner: Address,
        name: impl Into<String>,
        genes: u64,
        now: Timestamp,
    ) -> Result<ItemId, RegistryError> {
        if owner.is_null() {
            return Err(RegistryError::InvalidTarget("item owner"));
        }
        let id = self.item_count();
        self.items.push(ItemRecord {
            owner,
            approved: None,
            metadata: ItemMetadata {
                name: name.into(),
                genes,
                birth_time: now,
                last_fed: now,
            },
        });
        debug!(item = id, owner = %owner, "item registered");
        Ok(id)
    }

    pub fn metadata(&self, item: ItemId) -> Result<&ItemMetadata, RegistryError> {
        Ok(&self.record(item)?.metadata)
    }

    /// Number of items held by `owner`
    pub fn balance_of_items(&self, owner: Address) -> u64 {
        self.items.iter().filter(|r| r.owner == owner).count() as u64
    }

    /// Items held by `owner`, in id order
    pub fn items_of(&self, owner: Address) -> Vec<ItemId> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, r)| r.owner == owner)
            .map(|(id, _)| id as ItemId)
            .collect()
    }

    pub fn get_approved(&self, item: ItemId) -> Result<Option<Address>, RegistryError> {
        Ok(self.record(item)?.approved)
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operators.contains(&(owner, operator))
    }

    /// Approve `spender` for a single item; the null identifier clears the
    /// approval
    pub fn approve_item(&mut self, caller: Address, spender: Address, item: ItemId) -> Result<(), RegistryError> {
        let owner = self.record(item)?.owner;
        if caller != owner && !self.is_approved_for_all(owner, caller) {
            return Err(RegistryError::Unauthorized { caller, item });
        }

        let record = self.record_mut(item)?;
        record.approved = if spender.is_null() { None } else { Some(spender) };
        Ok(())
    }

    pub fn set_approval_for_all(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), RegistryError> {
        if operator.is_null() || operator == caller {
            return Err(RegistryError::InvalidTarget("operator"));
        }
        if approved {
            self.operators.insert((caller, operator));
        } else {
            self.operators.remove(&(caller, operator));
        }
        Ok(())
    }

    /// Move `item` from `from` to `to`. Active-wager blocking is the
    /// caller's responsibility since the registry does not see wagers.
    pub fn transfer_item(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        item: ItemId,
    ) -> Result<(), RegistryError> {
        let owner = self.record(item)?.owner;
        if !self.is_authorized(caller, item)? {
            return Err(RegistryError::Unauthorized { caller, item });
        }
        if from != owner {
            return Err(RegistryError::NotOwner { item, claimed: from });
        }
        if to.is_null() {
            return Err(RegistryError::InvalidTarget("item recipient"));
        }
        if to == from {
            return Ok(());
        }

        let record = self.record_mut(item)?;
        record.approved = None;
        record.owner = to;
        debug!(item, from = %from, to = %to, "item transferred");
        Ok(())
    }

    /// Whole intervals elapsed since the item was last fed
    pub fn meals_needed(&self, item: ItemId, now: Timestamp) -> Result<u64, RegistryError> {
        let last_fed = self.record(item)?.metadata.last_fed;
        Ok(now.saturating_sub(last_fed) / self.feeding.interval_secs.max(1))
    }

    /// Validate a feeding without changing anything
    pub fn plan_meal(
        &self,
        caller: Address,
        item: ItemId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<MealPlan, RegistryError> {
        if !self.is_authorized(caller, item)? {
            return Err(RegistryError::Unauthorized { caller, item });
        }
        let meals_needed = self.meals_needed(item, now)?;
        let cost = self.feeding.cost;
        let invalid = || RegistryError::InvalidMealAmount {
            amount,
            cost,
            meals_needed,
        };

        if amount == 0 || amount.checked_rem(cost) != Some(0) {
            return Err(invalid());
        }
        let meals = amount / cost;
        if meals > meals_needed {
            return Err(invalid());
        }

        let last_fed = self.record(item)?.metadata.last_fed + meals * self.feeding.interval_secs;
        Ok(MealPlan {
            item,
            payer: caller,
            amount,
            meals,
            last_fed,
        })
    }

    /// Apply a plan produced by [`Registry::plan_meal`]
    pub fn apply_meal(&mut self, plan: &MealPlan) -> Result<(), RegistryError> {
        let record = self.record_mut(plan.item)?;
        record.metadata.last_fed = plan.last_fed;
        debug!(item = plan.item, meals = plan.meals, last_fed = plan.last_fed, "item fed");
        Ok(())
    }
}

impl ItemRegistry for Registry {
    fn owner_of(&self, item: ItemId) -> Result<Address, RegistryError> {
        Ok(self.record(item)?.owner)
    }

    fn exists(&self, item: ItemId) -> bool {
        item < self.item_count()
    }

    fn is_authorized(&self, caller: Address, item: ItemId) -> Result<bool, RegistryError> {
        let record = self.record(item)?;
        Ok(caller == record.owner
            || record.approved == Some(caller)
            || self.is_approved_for_all(record.owner, caller))
    }
}

impl FeedingSchedule for Registry {
    fn is_fed(&self, item: ItemId, now: Timestamp) -> Result<bool, RegistryError> {
        Ok(self.meals_needed(item, now)? == 0)
    }
}
