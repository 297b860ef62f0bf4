//! Engine events and settlement receipts

use crate::common::types::{Address, Amount, ItemId, Timestamp};
use crate::wagers::state::FlipWinner;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a pair was settled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementKind {
    /// Both secrets revealed
    Flip {
        first_revealer: ItemId,
        outcome_bit: u8,
        winner_side: FlipWinner,
    },
    /// Decided by the referee
    Referee,
    /// The second party let the reveal window lapse
    Forfeit,
}

/// Record of one settlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub id: Uuid,
    pub winner_item: ItemId,
    pub loser_item: ItemId,
    pub winner: Address,
    pub loser: Address,
    /// Currency moved from loser to winner
    pub amount: Amount,
    pub kind: SettlementKind,
    pub settled_at: Timestamp,
}

/// Events published after each committed engine operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    BetPlaced {
        proposer: ItemId,
        target: ItemId,
        amount: Amount,
    },
    BetRemoved {
        proposer: ItemId,
        target: ItemId,
    },
    BetCommitted {
        proposer: ItemId,
        target: ItemId,
    },
    BetRevealed {
        proposer: ItemId,
        target: ItemId,
    },
    BetSettled {
        winner: ItemId,
        loser: ItemId,
        amount: Amount,
        receipt: Uuid,
    },
    ItemMinted {
        item: ItemId,
        owner: Address,
    },
    ItemFed {
        item: ItemId,
        last_fed: Timestamp,
    },
    ItemTransferred {
        item: ItemId,
        from: Address,
        to: Address,
    },
    RoleTransferred {
        role: String,
        from: Address,
        to: Address,
    },
}

impl From<&SettlementReceipt> for EngineEvent {
    fn from(receipt: &SettlementReceipt) -> Self {
        EngineEvent::BetSettled {
            winner: receipt.winner_item,
            loser: receipt.loser_item,
            amount: receipt.amount,
            receipt: receipt.id,
        }
    }
}
