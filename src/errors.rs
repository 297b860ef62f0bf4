//! Error types for the pairstake engine
//!
//! Every component has its own error enum; each one exposes a coarse
//! [`ErrorKind`] so callers can branch on the failure class without matching
//! every variant.

use crate::common::types::{Address, Amount, ItemId, Timestamp};
use serde::{Deserialize, Serialize};

/// Coarse failure classes shared by all components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidAmount,
    InsufficientFunds,
    BelowCommitted,
    InvalidState,
    HashMismatch,
    InvalidTarget,
}

/// Root error type for all pairstake operations
#[derive(Debug, thiserror::Error)]
pub enum PairstakeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Wager error: {0}")]
    Wager(#[from] WagerError),

    #[error("Role error: {0}")]
    Role(#[from] RoleError),
}

impl PairstakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PairstakeError::Configuration(e) => e.kind(),
            PairstakeError::Ledger(e) => e.kind(),
            PairstakeError::Registry(e) => e.kind(),
            PairstakeError::Wager(e) => e.kind(),
            PairstakeError::Role(e) => e.kind(),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::InvalidValue { .. } => ErrorKind::InvalidTarget,
            _ => ErrorKind::InvalidState,
        }
    }
}

/// Currency ledger errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{caller} is not the ledger controller")]
    Unauthorized { caller: Address },

    #[error("null identifier not allowed as {0}")]
    InvalidTarget(&'static str),

    #[error("insufficient balance for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("insufficient allowance from {owner} to {spender}: available {available}, requested {requested}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("allowance {requested} for {owner} is below committed wagers {committed}")]
    BelowCommitted {
        owner: Address,
        committed: Amount,
        requested: Amount,
    },

    #[error("release of {requested} exceeds committed {committed} for {owner}")]
    Underflow {
        owner: Address,
        committed: Amount,
        requested: Amount,
    },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("ledger invariant violated: {0}")]
    InvariantViolated(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LedgerError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientAllowance { .. } => {
                ErrorKind::InsufficientFunds
            }
            LedgerError::BelowCommitted { .. } => ErrorKind::BelowCommitted,
            LedgerError::Underflow { .. } | LedgerError::Overflow(_) => ErrorKind::InvalidAmount,
            LedgerError::InvariantViolated(_) => ErrorKind::InvalidState,
        }
    }
}

/// Item registry and feeding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("item {0} does not exist")]
    NotFound(ItemId),

    #[error("{caller} is not authorized for item {item}")]
    Unauthorized { caller: Address, item: ItemId },

    #[error("{claimed} does not own item {item}")]
    NotOwner { item: ItemId, claimed: Address },

    #[error("null identifier not allowed as {0}")]
    InvalidTarget(&'static str),

    #[error("item {0} has an active wager")]
    ActiveWager(ItemId),

    #[error("feeding amount {amount} is not a multiple of {cost} covering at most {meals_needed} meals")]
    InvalidMealAmount {
        amount: Amount,
        cost: Amount,
        meals_needed: u64,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::Unauthorized { .. } | RegistryError::NotOwner { .. } => {
                ErrorKind::Unauthorized
            }
            RegistryError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            RegistryError::ActiveWager(_) => ErrorKind::InvalidState,
            RegistryError::InvalidMealAmount { .. } => ErrorKind::InvalidAmount,
            RegistryError::Ledger(e) => e.kind(),
        }
    }
}

/// Betting protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WagerError {
    #[error("no wager from item {proposer} on item {target}")]
    WagerNotFound { proposer: ItemId, target: ItemId },

    #[error("{caller} is not authorized for item {item}")]
    Unauthorized { caller: Address, item: ItemId },

    #[error("wager amount must be positive")]
    ZeroAmount,

    #[error("wager amount {0} is unchanged")]
    UnchangedAmount(Amount),

    #[error("item {0} is hungry")]
    NotFed(ItemId),

    #[error("pair ({proposer}, {target}) is locked by a commitment")]
    PairLocked { proposer: ItemId, target: ItemId },

    #[error("pair ({proposer}, {target}) is cooling down until {until}")]
    Cooldown {
        proposer: ItemId,
        target: ItemId,
        until: Timestamp,
    },

    #[error("mirror wager ({target}, {proposer}) has not been placed")]
    MirrorNotPlaced { proposer: ItemId, target: ItemId },

    #[error("wager ({proposer}, {target}) is already committed")]
    AlreadyCommitted { proposer: ItemId, target: ItemId },

    #[error("wager ({proposer}, {target}) is not committed")]
    NotCommitted { proposer: ItemId, target: ItemId },

    #[error("wager ({proposer}, {target}) is already revealed")]
    AlreadyRevealed { proposer: ItemId, target: ItemId },

    #[error("wager ({proposer}, {target}) is no longer open")]
    NotProposed { proposer: ItemId, target: ItemId },

    #[error("reveal window for ({proposer}, {target}) is open until {until}")]
    RevealWindowOpen {
        proposer: ItemId,
        target: ItemId,
        until: Timestamp,
    },

    #[error("secret does not match commitment for ({proposer}, {target})")]
    HashMismatch { proposer: ItemId, target: ItemId },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl WagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WagerError::WagerNotFound { .. } => ErrorKind::NotFound,
            WagerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            WagerError::ZeroAmount | WagerError::UnchangedAmount(_) => ErrorKind::InvalidAmount,
            WagerError::NotFed(_)
            | WagerError::PairLocked { .. }
            | WagerError::Cooldown { .. }
            | WagerError::MirrorNotPlaced { .. }
            | WagerError::AlreadyCommitted { .. }
            | WagerError::NotCommitted { .. }
            | WagerError::AlreadyRevealed { .. }
            | WagerError::NotProposed { .. }
            | WagerError::RevealWindowOpen { .. } => ErrorKind::InvalidState,
            WagerError::HashMismatch { .. } => ErrorKind::HashMismatch,
            WagerError::Registry(e) => e.kind(),
            WagerError::Ledger(e) => e.kind(),
        }
    }
}

/// Privileged role errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    #[error("{caller} does not hold the {role} role")]
    NotHolder { role: &'static str, caller: Address },

    #[error("the {0} role cannot be given to the null identifier")]
    NullHolder(&'static str),
}

impl RoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoleError::NotHolder { .. } => ErrorKind::Unauthorized,
            RoleError::NullHolder(_) => ErrorKind::InvalidTarget,
        }
    }
}

// Convenience type alias for Results
pub type PairstakeResult<T> = Result<T, PairstakeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err: PairstakeError = ConfigError::ValidationFailed("test".to_string()).into();
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn test_kind_passes_through_wrappers() {
        let ledger = LedgerError::BelowCommitted {
            owner: Address::from_low_u64(1),
            committed: 20,
            requested: 19,
        };
        let wager: WagerError = ledger.clone().into();
        let root: PairstakeError = wager.into();
        assert_eq!(root.kind(), ErrorKind::BelowCommitted);

        let registry: RegistryError = LedgerError::Overflow("mint").into();
        assert_eq!(registry.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn test_protocol_state_errors_share_kind() {
        let locked = WagerError::PairLocked { proposer: 0, target: 1 };
        let mirror = WagerError::MirrorNotPlaced { proposer: 0, target: 1 };
        let committed = WagerError::AlreadyCommitted { proposer: 0, target: 1 };
        assert_eq!(locked.kind(), ErrorKind::InvalidState);
        assert_eq!(mirror.kind(), ErrorKind::InvalidState);
        assert_eq!(committed.kind(), ErrorKind::InvalidState);
        assert_eq!(
            WagerError::HashMismatch { proposer: 0, target: 1 }.kind(),
            ErrorKind::HashMismatch
        );
    }

    #[test]
    fn test_error_source() {
        let err: PairstakeError = ConfigError::ValidationFailed("test".to_string()).into();
        assert!(err.source().is_some());
    }

    #[test]
    fn test_role_error_kinds() {
        let not_holder = RoleError::NotHolder {
            role: "referee",
            caller: Address::from_low_u64(9),
        };
        assert_eq!(not_holder.kind(), ErrorKind::Unauthorized);
        assert_eq!(RoleError::NullHolder("minter").kind(), ErrorKind::InvalidTarget);
    }
}
