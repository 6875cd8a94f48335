use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use serv_primitives::{
    decimal::{self, serde_decimal, Decimal},
    serde_balance, Address, Balance, BlockNumber,
};

pub const MODULE_NAME: &str = "noderewards";

/// Response time recorded until a latency feed exists, in milliseconds.
pub const DEFAULT_RESPONSE_TIME_MS: u64 = 100;

/// Response time at or above which the response score is zero.
pub const RESPONSE_TIME_CEILING_MS: u64 = 1_000;

pub mod keys {
    use serv_primitives::Address;

    pub const STORE_PREFIX: &[u8] = b"noderewards/";

    const NODE_PERFORMANCE: u8 = 0x01;
    const REWARD_MODIFIER_PARAMS: u8 = 0x02;

    pub fn performance_prefix() -> Vec<u8> {
        let mut key = STORE_PREFIX.to_vec();
        key.push(NODE_PERFORMANCE);
        key
    }

    pub fn performance(validator: &Address) -> Vec<u8> {
        let mut key = performance_prefix();
        key.extend(validator.key_segment());
        key
    }

    pub fn params() -> Vec<u8> {
        let mut key = STORE_PREFIX.to_vec();
        key.push(REWARD_MODIFIER_PARAMS);
        key
    }
}

pub mod events {
    pub const NODE_PERFORMANCE_UPDATED: &str = "node_performance_updated";
    pub const REWARD_MODIFIED: &str = "reward_modified";
    pub const PARAMS_UPDATED: &str = "reward_modifier_params_updated";

    pub const ATTR_VALIDATOR: &str = "validator";
    pub const ATTR_SERVICE_SCORE: &str = "service_score";
    pub const ATTR_UPTIME: &str = "uptime";
    pub const ATTR_RESPONSE_TIME: &str = "response_time";
    pub const ATTR_BASE_REWARD: &str = "base_reward";
    pub const ATTR_MODIFIER: &str = "modifier";
    pub const ATTR_MODIFIED_REWARD: &str = "modified_reward";
}

/// Per-block performance snapshot of one validator.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NodePerformance {
    pub validator: Address,
    #[serde(with = "serde_balance")]
    pub service_score: Balance,
    /// Share of the signing window signed, in `[0, 1]`.
    #[serde(with = "serde_decimal")]
    pub uptime_percent: Decimal,
    /// Milliseconds.
    pub response_time: u64,
    pub last_update_height: BlockNumber,
}

impl NodePerformance {
    /// Snapshot assumed for a validator never measured before.
    pub fn initial(validator: Address) -> Self {
        Self {
            validator,
            service_score: 0,
            uptime_percent: decimal::one(),
            response_time: DEFAULT_RESPONSE_TIME_MS,
            last_update_height: 0,
        }
    }
}

#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RewardModifierParams {
    #[serde(with = "serde_decimal")]
    pub service_score_weight: Decimal,
    #[serde(with = "serde_decimal")]
    pub uptime_weight: Decimal,
    #[serde(with = "serde_decimal")]
    pub response_time_weight: Decimal,
    /// Multiplier paid to the worst performer, e.g. 0.5 for half the base reward.
    #[serde(with = "serde_decimal")]
    pub min_modifier: Decimal,
    #[serde(with = "serde_decimal")]
    pub max_modifier: Decimal,
}

impl Default for RewardModifierParams {
    fn default() -> Self {
        let tenths = |n| decimal::ratio(n, 10);
        Self {
            service_score_weight: tenths(5),
            uptime_weight: tenths(3),
            response_time_weight: tenths(2),
            min_modifier: tenths(5),
            max_modifier: decimal::from_integer(2),
        }
    }
}

impl RewardModifierParams {
    pub fn validate(&self) -> Result<(), String> {
        let sum = decimal::add(
            decimal::add(self.service_score_weight, self.uptime_weight),
            self.response_time_weight,
        );
        if sum != decimal::one() {
            return Err(format!("weights must sum to 1, got: {}", decimal::format(sum)));
        }
        if self.min_modifier > self.max_modifier {
            return Err(format!(
                "minimum modifier cannot be greater than maximum modifier: {} > {}",
                decimal::format(self.min_modifier),
                decimal::format(self.max_modifier)
            ));
        }
        Ok(())
    }
}
