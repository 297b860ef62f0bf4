//! Pairstake - wager-aware currency ledger and commit-reveal item duels
//!
//! A fungible currency ledger whose allowances always cover outstanding
//! wagers, a registry of uniquely owned collectible items that need regular
//! feeding, and a two-party commit-reveal coin flip that settles wagers
//! between pairs of items without giving the second revealer an edge.
//!
//! [`Engine`] ties the pieces together behind one lock and publishes
//! [`EngineEvent`]s after every committed operation.

pub mod common;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod registry;
pub mod wagers;

pub use common::clock::{ManualClock, SystemClock};
pub use common::config::ConfigLoader;
pub use common::traits::{Clock, FeedingSchedule, ItemRegistry, StakeLedger, StakeTransfer};
pub use common::types::{Address, Amount, CommitmentHash, ItemId, Secret, Timestamp};
pub use config::PairstakeConfig;
pub use engine::{Engine, Role};
pub use errors::{ErrorKind, PairstakeError, PairstakeResult};
pub use ledger::Ledger;
pub use registry::Registry;
pub use wagers::{
    commitment_for, EngineEvent, RevealOutcome, SettlementKind, SettlementReceipt, Wager,
    WagerBook, WagerState,
};
