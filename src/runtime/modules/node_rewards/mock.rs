use std::sync::{Arc, Mutex};

use mockall::mock;
use serv_primitives::{
    Address, Balance, BlockHeader, Context, MemoryStore, ServiceScores, StoreError, ValidatorSet,
};

use crate::{Keeper, NodePerformance, NodeRewardsHooks};

mock! {
    pub Validators {}
    impl ValidatorSet for Validators {
        fn is_validator(&self, ctx: &Context, addr: &Address) -> bool;
        fn active_validators(&self, ctx: &Context) -> Vec<Address>;
        fn missed_blocks(&self, ctx: &Context, addr: &Address) -> Option<u64>;
        fn signing_window(&self, ctx: &Context, addr: &Address) -> u64;
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
    Context::new(MemoryStore::new(), BlockHeader { height, time: 1_000 + height })
}

/// Validators with a fixed missed-block count each, all sharing `window`.
pub fn validators_with_uptime(entries: &[(&str, Option<u64>)], window: u64) -> MockValidators {
    let table: Vec<(Address, Option<u64>)> = entries.iter().map(|(n, m)| (addr(n), *m)).collect();
    let active: Vec<Address> = table.iter().map(|(a, _)| a.clone()).collect();

    let mut mock = MockValidators::new();
    mock.expect_active_validators().returning(move |_| active.clone());
    mock.expect_missed_blocks().returning(move |_, validator| {
        table
            .iter()
            .find(|(a, _)| a == validator)
            .and_then(|(_, missed)| *missed)
    });
    mock.expect_signing_window().returning(move |_, _| window);
    mock
}

/// Score source with fixed per-address scores and a fixed total.
pub fn scores(entries: &[(&str, Balance)], total: Balance) -> MockScores {
    let table: Vec<(Address, Balance)> = entries.iter().map(|(n, s)| (addr(n), *s)).collect();

    let mut mock = MockScores::new();
    mock.expect_service_score().returning(move |_, provider| {
        Ok(table
            .iter()
            .find(|(a, _)| a == provider)
            .map_or(0, |(_, score)| *score))
    });
    mock.expect_total_service_score().returning(move |_| Ok(total));
    mock
}

pub fn keeper(validators: MockValidators, scores: MockScores) -> Keeper {
    Keeper::new(Arc::new(validators), Arc::new(scores), governance())
}

#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub updated: Arc<Mutex<Vec<(Address, u64)>>>,
}

impl NodeRewardsHooks for RecordingHooks {
    fn after_performance_updated(&self, _ctx: &mut Context, validator: &Address, performance: &NodePerformance) {
        self.updated
            .lock()
            .unwrap()
            .push((validator.clone(), performance.last_update_height));
    }
}
