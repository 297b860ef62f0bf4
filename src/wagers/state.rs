//! Wager records and the coin-flip outcome rule

use crate::common::types::{Address, Amount, CommitmentHash, ItemId, Secret, Timestamp};
use serde::{Deserialize, Serialize};

/// Directed pair `(proposer, target)` keying the wager arena
pub type PairKey = (ItemId, ItemId);

/// Undirected form of a pair, used for per-pair bookkeeping
pub fn unordered(a: ItemId, b: ItemId) -> PairKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Lifecycle of one side of a pair. Absent and settled sides have no record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WagerState {
    Proposed,
    Committed {
        commitment: CommitmentHash,
        committed_at: Timestamp,
    },
    Revealed {
        commitment: CommitmentHash,
        secret: Secret,
        revealed_at: Timestamp,
    },
}

impl WagerState {
    /// True once a commitment has been stored
    pub fn is_committed(&self) -> bool {
        !matches!(self, WagerState::Proposed)
    }

    pub fn is_revealed(&self) -> bool {
        matches!(self, WagerState::Revealed { .. })
    }
}

/// One directed wager
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub amount: Amount,
    /// Account holding the reservation
    pub staker: Address,
    pub placed_at: Timestamp,
    pub state: WagerState,
}

/// Which revealer's item wins the flip
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipWinner {
    FirstRevealer,
    LastRevealer,
}

/// Outcome bit is the parity of `first XOR last`; odd favours the last
/// revealer, even the first.
pub fn flip(first: &Secret, last: &Secret) -> (u8, FlipWinner) {
    let bit = first.xor(last).parity();
    let winner = if bit == 1 {
        FlipWinner::LastRevealer
    } else {
        FlipWinner::FirstRevealer
    };
    (bit, winner)
}
