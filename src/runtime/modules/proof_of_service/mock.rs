use std::sync::{Arc, Mutex};

use mockall::mock;
use serv_primitives::{Address, Balance, BlockHeader, Context, MemoryStore, ValidatorSet};

use crate::{Keeper, ProofOfServiceHooks};

mock! {
    pub Validators {}
    impl ValidatorSet for Validators {
        fn is_validator(&self, ctx: &Context, addr: &Address) -> bool;
        fn active_validators(&self, ctx: &Context) -> Vec<Address>;
        fn missed_blocks(&self, ctx: &Context, addr: &Address) -> Option<u64>;
        fn signing_window(&self, ctx: &Context, addr: &Address) -> u64;
    }
}

pub const GOVERNANCE: &str = "gov";

pub fn addr(name: &str) -> Address {
    Address::new(name).unwrap()
}

pub fn governance() -> Address {
    addr(GOVERNANCE)
}

/// Validator set where exactly `names` are validators.
pub fn validators(names: &[&str]) -> MockValidators {
    let members: Vec<Address> = names.iter().map(|n| addr(n)).collect();
    let mut mock = MockValidators::new();
    mock.expect_is_validator()
        .returning(move |_, candidate| members.contains(candidate));
    mock
}

pub fn new_test_ctx(height: u64) -> Context {
    Context::new(
        MemoryStore::new(),
        BlockHeader {
            height,
            time: 1_700_000_000 + height * 6,
        },
    )
}

// Build a keeper backed by validators val1..val3 and a context at height 1
pub fn new_test_ext() -> (Keeper, Context) {
    let keeper = Keeper::new(Arc::new(validators(&["val1", "val2", "val3"])), governance());
    (keeper, new_test_ctx(1))
}

pub fn advance_to(ctx: &mut Context, height: u64) {
    ctx.set_header(BlockHeader {
        height,
        time: 1_700_000_000 + height * 6,
    });
}

/// Hook observer appending one line per notification.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProofOfServiceHooks for RecordingHooks {
    fn after_provider_registered(&self, _ctx: &mut Context, provider: &Address) {
        self.calls.lock().unwrap().push(format!("registered:{provider}"));
    }

    fn after_proof_submitted(&self, _ctx: &mut Context, provider: &Address, proof_id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("submitted:{provider}:{proof_id}"));
    }

    fn after_proof_verified(&self, _ctx: &mut Context, provider: &Address, proof_id: &str, score: Balance) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("verified:{provider}:{proof_id}:{score}"));
    }
}
