use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use serv_primitives::{
    decimal::{self, serde_decimal, Decimal},
    serde_balance, Address, Balance, EpochNumber,
};

/// Module name; also the module account that mints and pays out rewards.
pub const MODULE_NAME: &str = "servrewards";

/// Denomination of paid rewards.
pub const DENOM: &str = "userv";

pub mod keys {
    use serv_primitives::Address;

    pub const STORE_PREFIX: &[u8] = b"servrewards/";

    const REWARD_METRICS: u8 = 0x01;
    const ACCUMULATED_REWARDS: u8 = 0x02;
    const REWARD_PARAMS: u8 = 0x03;

    fn prefixed(kind: u8) -> Vec<u8> {
        let mut key = STORE_PREFIX.to_vec();
        key.push(kind);
        key
    }

    pub fn metrics() -> Vec<u8> {
        prefixed(REWARD_METRICS)
    }

    pub fn accumulated_prefix() -> Vec<u8> {
        prefixed(ACCUMULATED_REWARDS)
    }

    pub fn accumulated(addr: &Address) -> Vec<u8> {
        let mut key = accumulated_prefix();
        key.extend(addr.key_segment());
        key
    }

    pub fn params() -> Vec<u8> {
        prefixed(REWARD_PARAMS)
    }
}

pub mod events {
    pub const REWARD_CLAIMED: &str = "reward_claimed";
    pub const REWARD_ACCRUED: &str = "reward_accrued";
    pub const EPOCH_COMPLETED: &str = "epoch_completed";
    pub const PARAMS_UPDATED: &str = "reward_params_updated";

    pub const ATTR_ADDRESS: &str = "address";
    pub const ATTR_AMOUNT: &str = "amount";
    pub const ATTR_EPOCH: &str = "epoch";
    pub const ATTR_TOTAL_SERVICE_SCORE: &str = "total_service_score";
    pub const ATTR_TOTAL_STAKED: &str = "total_staked";
}

/// Chain-wide totals snapshotted at the last epoch boundary.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct RewardMetrics {
    #[serde(with = "serde_balance")]
    pub total_service_score: Balance,
    #[serde(with = "serde_balance")]
    pub total_staked: Balance,
    pub epoch_number: EpochNumber,
}

#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RewardParams {
    #[serde(with = "serde_decimal")]
    pub service_score_weight: Decimal,
    #[serde(with = "serde_decimal")]
    pub staking_weight: Decimal,
    #[serde(with = "serde_balance")]
    pub reward_per_epoch: Balance,
    /// Blocks per epoch.
    pub epoch_duration: u64,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            service_score_weight: decimal::ratio(6, 10),
            staking_weight: decimal::ratio(4, 10),
            reward_per_epoch: 1_000_000,
            epoch_duration: 100,
        }
    }
}

impl RewardParams {
    pub fn validate(&self) -> Result<(), String> {
        let sum = decimal::add(self.service_score_weight, self.staking_weight);
        if sum != decimal::one() {
            return Err(format!(
                "service score weight and staking weight must sum to 1, got: {}",
                decimal::format(sum)
            ));
        }
        if self.epoch_duration == 0 {
            return Err("epoch duration must be positive".into());
        }
        Ok(())
    }
}

/// Pending rewards of one address.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AccumulatedRewards {
    pub address: Address,
    #[serde(with = "serde_balance")]
    pub rewards: Balance,
    /// Epoch of the last claim.
    pub last_claim: EpochNumber,
}

impl AccumulatedRewards {
    pub fn empty(address: Address) -> Self {
        Self {
            address,
            rewards: 0,
            last_claim: 0,
        }
    }
}
