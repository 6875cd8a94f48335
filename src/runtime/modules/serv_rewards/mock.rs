use std::sync::{Arc, Mutex};

use mockall::mock;
use serv_primitives::{
    Address, Balance, BlockHeader, Context, EpochNumber, MemoryStore, ServiceScores, StakingLedger,
    StoreError, TokenTransfer, TransferError,
};

use crate::{Keeper, ServRewardsHooks};

mock! {
    pub Bank {}
    impl TokenTransfer for Bank {
        fn mint(&self, ctx: &mut Context, module: &str, amount: Balance) -> Result<(), TransferError>;
        fn transfer(
            &self,
            ctx: &mut Context,
            module: &str,
            to: &Address,
            amount: Balance,
        ) -> Result<(), TransferError>;
    }
}

mock! {
    pub Staking {}
    impl StakingLedger for Staking {
        fn total_bonded_stake(&self, ctx: &Context) -> Balance;
        fn delegator_stake(&self, ctx: &Context, addr: &Address) -> Balance;
        fn bonded_accounts(&self, ctx: &Context) -> Vec<Address>;
    }
}

mock! {
    pub Scores {}
    impl ServiceScores for Scores {
        fn service_score(&self, ctx: &Context, addr: &Address) -> Result<Balance, StoreError>;
        fn total_service_score(&self, ctx: &Context) -> Result<Balance, StoreError>;
        fn providers(&self, ctx: &Context) -> Result<Vec<Address>, StoreError>;
    }
}

pub const GOVERNANCE: &str = "gov";

pub fn addr(name: &str) -> Address {
    Address::new(name).unwrap()
}

pub fn governance() -> Address {
    addr(GOVERNANCE)
}

pub fn new_test_ctx(height: u64) -> Context {
    Context::new(MemoryStore::new(), BlockHeader { height, time: 1_000 })
}

fn lookup(table: &[(Address, Balance)], who: &Address) -> Balance {
    table.iter().find(|(a, _)| a == who).map_or(0, |(_, v)| *v)
}

/// Stake ledger with fixed per-account stakes; the total is their sum.
pub fn staking(entries: &[(&str, Balance)]) -> MockStaking {
    let table: Vec<(Address, Balance)> = entries.iter().map(|(n, v)| (addr(n), *v)).collect();
    let total: Balance = table.iter().map(|(_, v)| v).sum();
    let accounts: Vec<Address> = table.iter().map(|(a, _)| a.clone()).collect();

    let mut mock = MockStaking::new();
    mock.expect_total_bonded_stake().returning(move |_| total);
    mock.expect_delegator_stake()
        .returning(move |_, who| lookup(&table, who));
    mock.expect_bonded_accounts().returning(move |_| accounts.clone());
    mock
}

/// Score source whose providers are exactly the scored addresses.
pub fn scores(entries: &[(&str, Balance)]) -> MockScores {
    let table: Vec<(Address, Balance)> = entries.iter().map(|(n, v)| (addr(n), *v)).collect();
    let total: Balance = table.iter().map(|(_, v)| v).sum();
    let providers: Vec<Address> = table.iter().map(|(a, _)| a.clone()).collect();

    let mut mock = MockScores::new();
    mock.expect_service_score()
        .returning(move |_, who| Ok(lookup(&table, who)));
    mock.expect_total_service_score().returning(move |_| Ok(total));
    mock.expect_providers().returning(move |_| Ok(providers.clone()));
    mock
}

/// Bank that accepts every mint and transfer.
pub fn permissive_bank() -> MockBank {
    let mut bank = MockBank::new();
    bank.expect_mint().returning(|_, _, _| Ok(()));
    bank.expect_transfer().returning(|_, _, _, _| Ok(()));
    bank
}

pub fn keeper(bank: impl TokenTransfer + 'static, staking: MockStaking, scores: MockScores) -> Keeper {
    Keeper::new(Arc::new(bank), Arc::new(staking), Arc::new(scores), governance())
}

/// Token subsystem keeping balances in the context store, so its writes
/// share the caller's transaction.
pub struct StoreBank {
    pub fail_transfers: bool,
}

impl StoreBank {
    pub fn balance_key(account: &str) -> Vec<u8> {
        format!("bank/{account}").into_bytes()
    }

    pub fn balance(ctx: &Context, account: &str) -> Balance {
        ctx.get(&Self::balance_key(account))
            .map(|raw| u128::from_be_bytes(raw.try_into().unwrap()))
            .unwrap_or(0)
    }

    fn credit(ctx: &mut Context, account: &str, amount: Balance) {
        let balance = Self::balance(ctx, account) + amount;
        ctx.set(Self::balance_key(account), balance.to_be_bytes().to_vec());
    }
}

impl TokenTransfer for StoreBank {
    fn mint(&self, ctx: &mut Context, module: &str, amount: Balance) -> Result<(), TransferError> {
        Self::credit(ctx, module, amount);
        Ok(())
    }

    fn transfer(&self, ctx: &mut Context, module: &str, to: &Address, amount: Balance) -> Result<(), TransferError> {
        if self.fail_transfers {
            return Err(TransferError::Rejected(format!("{to} is blocked")));
        }
        let available = Self::balance(ctx, module);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                module: module.to_owned(),
                needed: amount,
            });
        }
        ctx.set(Self::balance_key(module), (available - amount).to_be_bytes().to_vec());
        Self::credit(ctx, to.as_str(), amount);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub epochs: Arc<Mutex<Vec<EpochNumber>>>,
}

impl ServRewardsHooks for RecordingHooks {
    fn after_epoch_completed(&self, _ctx: &mut Context, epoch: EpochNumber) {
        self.epochs.lock().unwrap().push(epoch);
    }
}
