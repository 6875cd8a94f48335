//! # Serv Rewards Module
//!
//! Epoch based reward ledger. At every epoch boundary the module snapshots the
//! total service score and total bonded stake, then credits each participant
//! a share of `reward_per_epoch` split between service and stake. Participants
//! claim what has accrued at most once per epoch; a claim mints the amount to
//! the module account and transfers it out atomically with the ledger update.

use serv_primitives::{Address, EpochNumber, ErrorKind, StoreError, TransferError};
use thiserror::Error;

pub mod genesis;
pub mod keeper;
pub mod types;

#[cfg(test)]
mod mock;


pub use genesis::GenesisState;
pub use keeper::Keeper;
pub use types::{AccumulatedRewards, RewardMetrics, RewardParams};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Rewards of {address} already claimed in epoch {epoch}")]
    AlreadyClaimedThisEpoch { address: Address, epoch: EpochNumber },

    #[error("Token transfer failed: {0}")]
    TokenTransfer(#[from] TransferError),

    #[error("Invalid reward params: {0}")]
    InvalidParams(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} is not the governance authority")]
    Unauthorized(Address),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyClaimedThisEpoch { .. } => ErrorKind::Conflict,
            Error::TokenTransfer(_) => ErrorKind::Internal,
            Error::InvalidParams(_) | Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Store(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Notified once per completed epoch, after accrual.
pub trait ServRewardsHooks: Send + Sync {
    fn after_epoch_completed(&self, ctx: &mut serv_primitives::Context, epoch: EpochNumber);
}
