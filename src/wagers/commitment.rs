//! Wager commitments
//!
//! A commitment is SHA-256 over a domain tag, the ordered item pair and the
//! secret. Binding the pair means a commitment lifted from the opposite
//! direction of the same pair (or any other pair) never verifies.

use crate::common::types::{CommitmentHash, ItemId, Secret};
use sha2::{Digest, Sha256};

/// Domain separator for wager commitments.
const COMMITMENT_DOMAIN: &[u8] = b"PAIRSTAKE_WAGER_COMMIT_V1";

/// Commitment for the wager `proposer -> target`
pub fn commitment_for(proposer: ItemId, target: ItemId, secret: &Secret) -> CommitmentHash {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(proposer.to_be_bytes());
    hasher.update(target.to_be_bytes());
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Check `secret` against a stored commitment
pub fn verify(proposer: ItemId, target: ItemId, secret: &Secret, commitment: &CommitmentHash) -> bool {
    commitment_for(proposer, target, secret) == *commitment
}

/// Hex rendering for logs and receipts
pub fn to_hex(commitment: &CommitmentHash) -> String {
    hex::encode(commitment)
}
