//! # Serv Runtime Primitives
//!
//! Building blocks shared by every runtime module of the service chain.
//!
//! ## Overview
//!
//! The runtime executes one state transition at a time against a single
//! deterministic key-value store. This crate provides:
//!
//! - The store abstraction and an in-memory implementation
//! - A block [`Context`] carrying the store, the block header and emitted events
//! - Nested write-buffering transactions that commit only on success
//! - Validated account [`Address`]es and deterministic fixed-point decimals
//! - The error taxonomy every module maps its failures onto
//! - The collaborator interfaces (validator set, staking ledger, token transfer)

pub mod address;
pub mod context;
pub mod decimal;
pub mod error;
pub mod event;
pub mod store;
pub mod traits;

pub use address::Address;
pub use context::{BlockHeader, Context};
pub use decimal::Decimal;
pub use error::{AddressError, ErrorKind, StoreError};
pub use event::{Event, EventManager};
pub use store::{KvStore, MemoryStore, StoreTransaction};
pub use traits::{ServiceScores, StakingLedger, TokenTransfer, TransferError, ValidatorSet};

/// Token amounts and scores are unsigned 128-bit integers.
pub type Balance = u128;

/// Block height.
pub type BlockNumber = u64;

/// Epoch counter.
pub type EpochNumber = u64;

/// Serde adapter writing 128-bit amounts as decimal strings.
pub mod serde_balance {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
