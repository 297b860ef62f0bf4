//! Item-pair wagers
//!
//! Commitment hashing, wager state, the commit-reveal protocol and the
//! events it emits.

pub mod commitment;
pub mod events;
pub mod protocol;
pub mod state;

pub use commitment::commitment_for;
pub use events::{EngineEvent, SettlementKind, SettlementReceipt};
pub use protocol::{RevealOutcome, WagerBook, WagerRules};
pub use state::{FlipWinner, PairKey, Wager, WagerState};
