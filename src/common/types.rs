//! Shared type definitions for the pairstake engine
//!
//! Canonical identifiers, amounts and secrets used by the ledger, the item
//! registry and the wager protocol.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currency amount in base units
pub type Amount = u64;

/// Sequential collectible identifier (0, 1, 2, ...)
pub type ItemId = u64;

/// Seconds on the engine clock
pub type Timestamp = u64;

/// SHA-256 commitment over a wager secret
pub type CommitmentHash = [u8; 32];

/// Errors produced while parsing hex-encoded identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| ParseIdError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| ParseIdError::WrongLength {
        expected: N,
        actual,
    })
}

/// Opaque 20-byte account identifier.
///
/// The all-zero address is the null identifier: it can never hold funds,
/// receive items or be approved as a spender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The null identifier
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose low 8 bytes hold `value` (big-endian).
    ///
    /// Handy for fixtures and simulations where readable ids matter more
    /// than entropy.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Random non-null address
    pub fn random() -> Self {
        let mut bytes = [0u8; 20];
        loop {
            rand::thread_rng().fill_bytes(&mut bytes);
            if bytes != [0u8; 20] {
                return Self(bytes);
            }
        }
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// 256-bit secret revealed during the commit-reveal flip.
///
/// Interpreted as a big-endian unsigned integer, so the low bit of the
/// integer is the low bit of the last byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret([u8; 32]);

impl Secret {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh secret from the thread-local CSPRNG
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Bitwise XOR of two secrets
    pub fn xor(&self, other: &Secret) -> Secret {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Secret(out)
    }

    /// The integer value reduced modulo 2
    pub fn parity(&self) -> u8 {
        self.0[31] & 1
    }
}

impl From<u64> for Secret {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Secret {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl TryFrom<String> for Secret {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.to_string()
    }
}
