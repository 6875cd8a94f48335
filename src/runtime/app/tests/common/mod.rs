#![allow(dead_code)]

use std::sync::Arc;

use serv_primitives::{
    Address, Balance, Context, MemoryStore, StakingLedger, TokenTransfer, TransferError, ValidatorSet,
};
use serv_runtime::{ChainConfig, Collaborators, ServRuntime};

pub const SIGNING_WINDOW: u64 = 100;

pub fn addr(name: &str) -> Address {
    Address::new(name).unwrap()
}

/// Validator registry and staking ledger with fixed contents.
pub struct FakeChain {
    /// Validator and its missed blocks, `None` when it has no signing info.
    pub validators: Vec<(Address, Option<u64>)>,
    pub stakes: Vec<(Address, Balance)>,
}

impl FakeChain {
    pub fn new(validators: &[(&str, Option<u64>)], stakes: &[(&str, Balance)]) -> Self {
        Self {
            validators: validators.iter().map(|(n, m)| (addr(n), *m)).collect(),
            stakes: stakes.iter().map(|(n, s)| (addr(n), *s)).collect(),
        }
    }
}

impl ValidatorSet for FakeChain {
    fn is_validator(&self, _ctx: &Context, addr: &Address) -> bool {
        self.validators.iter().any(|(v, _)| v == addr)
    }

    fn active_validators(&self, _ctx: &Context) -> Vec<Address> {
        self.validators.iter().map(|(v, _)| v.clone()).collect()
    }

    fn missed_blocks(&self, _ctx: &Context, addr: &Address) -> Option<u64> {
        self.validators
            .iter()
            .find(|(v, _)| v == addr)
            .and_then(|(_, missed)| *missed)
    }

    fn signing_window(&self, _ctx: &Context, _addr: &Address) -> u64 {
        SIGNING_WINDOW
    }
}

impl StakingLedger for FakeChain {
    fn total_bonded_stake(&self, _ctx: &Context) -> Balance {
        self.stakes.iter().map(|(_, s)| s).sum()
    }

    fn delegator_stake(&self, _ctx: &Context, addr: &Address) -> Balance {
        self.stakes
            .iter()
            .find(|(a, _)| a == addr)
            .map_or(0, |(_, s)| *s)
    }

    fn bonded_accounts(&self, _ctx: &Context) -> Vec<Address> {
        self.stakes.iter().map(|(a, _)| a.clone()).collect()
    }
}

/// Bank keeping balances in the runtime store.
pub struct StoreBank;

impl StoreBank {
    fn key(account: &str) -> Vec<u8> {
        format!("bank/balances/{account}").into_bytes()
    }

    pub fn balance(ctx: &Context, account: &str) -> Balance {
        ctx.get(&Self::key(account))
            .map(|raw| u128::from_be_bytes(raw.try_into().unwrap()))
            .unwrap_or(0)
    }

    fn set_balance(ctx: &mut Context, account: &str, amount: Balance) {
        ctx.set(Self::key(account), amount.to_be_bytes().to_vec());
    }
}

impl TokenTransfer for StoreBank {
    fn mint(&self, ctx: &mut Context, module: &str, amount: Balance) -> Result<(), TransferError> {
        let balance = Self::balance(ctx, module) + amount;
        Self::set_balance(ctx, module, balance);
        Ok(())
    }

    fn transfer(&self, ctx: &mut Context, module: &str, to: &Address, amount: Balance) -> Result<(), TransferError> {
        let available = Self::balance(ctx, module);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                module: module.to_string(),
                needed: amount,
            });
        }
        Self::set_balance(ctx, module, available - amount);
        let credited = Self::balance(ctx, to.as_str()) + amount;
        Self::set_balance(ctx, to.as_str(), credited);
        Ok(())
    }
}

pub fn collaborators(chain: FakeChain, bank: impl TokenTransfer + 'static) -> Collaborators {
    let chain = Arc::new(chain);
    Collaborators {
        validators: chain.clone(),
        staking: chain,
        bank: Arc::new(bank),
    }
}

/// Three validators, two of them bonded, quorum of three, 10-block epochs.
pub fn test_config() -> ChainConfig {
    let mut config = ChainConfig::default();
    config.chain_id = "serv-test".to_string();
    config.proof_of_service.params.proof_validity_period = 50;
    config.serv_rewards.params.reward_per_epoch = 1_000;
    config.serv_rewards.params.epoch_duration = 10;
    config
}

pub fn test_chain() -> FakeChain {
    FakeChain::new(
        &[("val1", Some(0)), ("val2", Some(10)), ("val3", None)],
        &[("val1", 500), ("val2", 500)],
    )
}

pub fn new_runtime() -> ServRuntime {
    let _ = tracing_subscriber::fmt::try_init();
    ServRuntime::from_config(&test_config(), collaborators(test_chain(), StoreBank), MemoryStore::new())
        .unwrap()
}
