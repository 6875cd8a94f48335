use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use serv_primitives::{
    decimal::{self, serde_decimal, Decimal},
    serde_balance, Address, Balance, BlockNumber,
};

/// Module name, also the module account used in events.
pub const MODULE_NAME: &str = "proofofservice";

/// Highest score a validator may assign to a single proof.
pub const MAX_PROOF_SCORE: u64 = 100;

pub mod keys {
    use serv_primitives::Address;

    /// Namespace of this module inside the shared store.
    pub const STORE_PREFIX: &[u8] = b"pos/";

    const SERVICE_PROVIDER: u8 = 0x01;
    const SERVICE_PROOF: u8 = 0x02;
    const SERVICE_SCORE: u8 = 0x03;
    const TOTAL_SERVICE_SCORE: u8 = 0x04;
    const SERVICE_PARAMS: u8 = 0x05;
    const PROOF_QUOTA: u8 = 0x06;

    fn prefixed(kind: u8) -> Vec<u8> {
        let mut key = STORE_PREFIX.to_vec();
        key.push(kind);
        key
    }

    pub fn provider_prefix() -> Vec<u8> {
        prefixed(SERVICE_PROVIDER)
    }

    pub fn provider(addr: &Address) -> Vec<u8> {
        let mut key = provider_prefix();
        key.extend(addr.key_segment());
        key
    }

    pub fn proof_prefix() -> Vec<u8> {
        prefixed(SERVICE_PROOF)
    }

    pub fn proofs_of(provider: &Address) -> Vec<u8> {
        let mut key = proof_prefix();
        key.extend(provider.key_segment());
        key
    }

    pub fn proof(provider: &Address, proof_id: &str) -> Vec<u8> {
        let mut key = proofs_of(provider);
        key.extend_from_slice(proof_id.as_bytes());
        key
    }

    pub fn score_prefix() -> Vec<u8> {
        prefixed(SERVICE_SCORE)
    }

    pub fn score(addr: &Address) -> Vec<u8> {
        let mut key = score_prefix();
        key.extend(addr.key_segment());
        key
    }

    pub fn total_score() -> Vec<u8> {
        prefixed(TOTAL_SERVICE_SCORE)
    }

    pub fn params() -> Vec<u8> {
        prefixed(SERVICE_PARAMS)
    }

    pub fn quota_prefix() -> Vec<u8> {
        prefixed(PROOF_QUOTA)
    }

    /// Counter key of one provider in one window. Windows are numbered per
    /// validity period, so the period is part of the key.
    pub fn quota(period: u64, window: u64, provider: &Address) -> Vec<u8> {
        let mut key = quota_prefix();
        key.extend_from_slice(&period.to_be_bytes());
        key.extend_from_slice(&window.to_be_bytes());
        key.extend(provider.key_segment());
        key
    }

    /// Period, window and provider encoded in a quota key, if well formed.
    pub fn decode_quota(key: &[u8]) -> Option<(u64, u64, Address)> {
        let rest = key.strip_prefix(quota_prefix().as_slice())?;
        let period: [u8; 8] = rest.get(..8)?.try_into().ok()?;
        let window: [u8; 8] = rest.get(8..16)?.try_into().ok()?;
        let (provider, tail) = Address::from_key_segment(rest.get(16..)?)?;
        if !tail.is_empty() {
            return None;
        }
        Some((u64::from_be_bytes(period), u64::from_be_bytes(window), provider))
    }
}

pub mod events {
    pub const PROVIDER_REGISTERED: &str = "service_provider_registered";
    pub const PROVIDER_STATUS_CHANGED: &str = "service_provider_status_changed";
    pub const PROOF_SUBMITTED: &str = "proof_submitted";
    pub const PROOF_VERIFIED: &str = "proof_verified";
    pub const PROOF_EXPIRED: &str = "proof_expired";
    pub const SCORES_DECAYED: &str = "service_scores_decayed";
    pub const PARAMS_UPDATED: &str = "service_params_updated";

    pub const ATTR_PROVIDER: &str = "provider";
    pub const ATTR_SERVICE_TYPE: &str = "service_type";
    pub const ATTR_PROOF_ID: &str = "proof_id";
    pub const ATTR_VALIDATOR: &str = "validator";
    pub const ATTR_VERIFIED: &str = "verified";
    pub const ATTR_SCORE: &str = "score";
    pub const ATTR_ACTIVE: &str = "active";
    pub const ATTR_DECAY_RATE: &str = "decay_rate";
    pub const ATTR_TOTAL_SCORE: &str = "total_service_score";
}

/// A registered service provider. Only `active` changes after registration.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub address: Address,
    pub service_type: String,
    pub metadata: String,
    /// Block time of registration.
    pub registered_at: u64,
    pub active: bool,
}

/// A claim of service delivery awaiting quorum verification.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ServiceProof {
    pub provider: Address,
    pub proof_id: String,
    pub service_type: String,
    pub evidence: Vec<u8>,
    /// Block time of submission.
    pub submitted_at: u64,
    pub submitted_height: BlockNumber,
    pub verified: bool,
    /// Validators that voted on this proof, in vote order.
    pub verified_by: Vec<Address>,
    /// Zero until the proof is verified.
    #[serde(with = "serde_balance")]
    pub score: Balance,
}

impl ServiceProof {
    /// An unverified proof is stale once its validity period has passed.
    pub fn is_expired(&self, height: BlockNumber, validity_period: u64) -> bool {
        !self.verified && self.submitted_height.saturating_add(validity_period) <= height
    }
}

/// Accumulated score of one provider.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ServiceScore {
    pub provider: Address,
    #[serde(with = "serde_balance")]
    pub score: Balance,
    /// Height of the last credit or decay.
    pub last_updated: BlockNumber,
}

impl ServiceScore {
    pub fn zero(provider: Address) -> Self {
        Self {
            provider,
            score: 0,
            last_updated: 0,
        }
    }
}

/// Governance-controlled verification parameters.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ServiceParams {
    /// Distinct votes needed before a proof can become verified.
    pub min_verifications: u32,
    /// Fraction of every score removed at each decay.
    #[serde(with = "serde_decimal")]
    pub score_decay_rate: Decimal,
    /// Blocks between decays; also the lifetime of an unverified proof.
    pub proof_validity_period: u64,
    /// Proofs a provider may submit within one validity window.
    pub max_proofs_per_epoch: u32,
}

impl Default for ServiceParams {
    fn default() -> Self {
        Self {
            min_verifications: 3,
            score_decay_rate: decimal::from_rational(1, 10).unwrap_or_else(decimal::zero),
            proof_validity_period: 100,
            max_proofs_per_epoch: 5,
        }
    }
}

impl ServiceParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_verifications == 0 {
            return Err("minimum verifications must be positive".into());
        }
        if self.score_decay_rate > decimal::one() {
            return Err(format!(
                "score decay rate must be between 0 and 1: {}",
                decimal::format(self.score_decay_rate)
            ));
        }
        if self.proof_validity_period == 0 {
            return Err("proof validity period must be positive".into());
        }
        if self.max_proofs_per_epoch == 0 {
            return Err("max proofs per epoch must be positive".into());
        }
        Ok(())
    }

    /// Index of the validity window containing `height`.
    pub fn window_of(&self, height: BlockNumber) -> u64 {
        height / self.proof_validity_period.max(1)
    }
}
