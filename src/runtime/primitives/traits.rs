//! Interfaces of the collaborators the runtime modules depend on.

use thiserror::Error;

use crate::{address::Address, context::Context, error::StoreError, Balance};

/// Validator registry as seen by the service modules.
pub trait ValidatorSet: Send + Sync {
    fn is_validator(&self, ctx: &Context, addr: &Address) -> bool;

    /// Currently active validators, in a deterministic order.
    fn active_validators(&self, ctx: &Context) -> Vec<Address>;

    /// Missed blocks inside the current signing window, `None` when the
    /// validator has no signing info yet.
    fn missed_blocks(&self, ctx: &Context, addr: &Address) -> Option<u64>;

    fn signing_window(&self, ctx: &Context, addr: &Address) -> u64;
}

/// Bonded stake bookkeeping.
pub trait StakingLedger: Send + Sync {
    fn total_bonded_stake(&self, ctx: &Context) -> Balance;

    fn delegator_stake(&self, ctx: &Context, addr: &Address) -> Balance;

    /// Every account holding bonded stake, in a deterministic order.
    fn bonded_accounts(&self, ctx: &Context) -> Vec<Address>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Module account {0} is not allowed to mint")]
    MintNotPermitted(String),

    #[error("Insufficient funds in module account {module}: need {needed}")]
    InsufficientFunds { module: String, needed: Balance },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Token subsystem. Writes go through the same context so they share the
/// caller's transaction.
pub trait TokenTransfer: Send + Sync {
    fn mint(&self, ctx: &mut Context, module: &str, amount: Balance) -> Result<(), TransferError>;

    fn transfer(
        &self,
        ctx: &mut Context,
        module: &str,
        to: &Address,
        amount: Balance,
    ) -> Result<(), TransferError>;
}

/// Read access to accumulated service scores.
pub trait ServiceScores: Send + Sync {
    fn service_score(&self, ctx: &Context, addr: &Address) -> Result<Balance, StoreError>;

    fn total_service_score(&self, ctx: &Context) -> Result<Balance, StoreError>;

    /// Every registered provider, in address key order.
    fn providers(&self, ctx: &Context) -> Result<Vec<Address>, StoreError>;
}
