//! # SERV Runtime
//!
//! Wires the proof of service, node rewards and serv rewards modules into a
//! block processor.
//!
//! A block is executed as:
//!
//! 1. `begin_block` - refresh every active validator's performance snapshot
//! 2. `deliver` - once per transaction, each in its own store transaction
//! 3. `end_block` - decay service scores and prune stale proofs, then close
//!    the reward epoch when due

use std::sync::Arc;

use serv_primitives::{
    Address, Balance, BlockHeader, Context, ErrorKind, Event, KvStore, StakingLedger, TokenTransfer,
    ValidatorSet,
};
use thiserror::Error;
use tracing::{debug, info};

pub mod config;

pub use config::ChainConfig;

/// Collaborators supplied by the host chain.
#[derive(Clone)]
pub struct Collaborators {
    pub validators: Arc<dyn ValidatorSet>,
    pub staking: Arc<dyn StakingLedger>,
    pub bank: Arc<dyn TokenTransfer>,
}

/// Authenticated transactions accepted by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    RegisterProvider {
        provider: Address,
        service_type: String,
        metadata: String,
    },
    SubmitProof {
        provider: Address,
        service_type: String,
        proof_id: String,
        evidence: Vec<u8>,
    },
    VerifyProof {
        validator: Address,
        provider: Address,
        proof_id: String,
        is_verified: bool,
        score: u64,
    },
    SetProviderActive {
        authority: Address,
        provider: Address,
        active: bool,
    },
    ClaimReward {
        address: Address,
    },
    UpdateServiceParams {
        authority: Address,
        params: proof_of_service::ServiceParams,
    },
    UpdateModifierParams {
        authority: Address,
        params: node_rewards::RewardModifierParams,
    },
    UpdateRewardParams {
        authority: Address,
        params: serv_rewards::RewardParams,
    },
}

impl Transaction {
    pub fn name(&self) -> &'static str {
        match self {
            Transaction::RegisterProvider { .. } => "register_provider",
            Transaction::SubmitProof { .. } => "submit_proof",
            Transaction::VerifyProof { .. } => "verify_proof",
            Transaction::SetProviderActive { .. } => "set_provider_active",
            Transaction::ClaimReward { .. } => "claim_reward",
            Transaction::UpdateServiceParams { .. } => "update_service_params",
            Transaction::UpdateModifierParams { .. } => "update_modifier_params",
            Transaction::UpdateRewardParams { .. } => "update_reward_params",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("proof of service: {0}")]
    ProofOfService(#[from] proof_of_service::Error),

    #[error("node rewards: {0}")]
    NodeRewards(#[from] node_rewards::Error),

    #[error("serv rewards: {0}")]
    ServRewards(#[from] serv_rewards::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::ProofOfService(e) => e.kind(),
            DispatchError::NodeRewards(e) => e.kind(),
            DispatchError::ServRewards(e) => e.kind(),
        }
    }
}

/// Value produced by a successful transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutput {
    None,
    Claimed(Balance),
}

pub struct ServRuntime {
    ctx: Context,
    pos: Arc<proof_of_service::Keeper>,
    node_rewards: node_rewards::Keeper,
    serv_rewards: serv_rewards::Keeper,
}

impl ServRuntime {
    /// Build the keepers on top of `store` and load every module's genesis.
    pub fn from_config(
        config: &ChainConfig,
        collaborators: Collaborators,
        store: impl KvStore + 'static,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let authority = config.authority()?;

        let pos = Arc::new(proof_of_service::Keeper::new(
            collaborators.validators.clone(),
            authority.clone(),
        ));
        let node_rewards =
            node_rewards::Keeper::new(collaborators.validators, pos.clone(), authority.clone());
        let serv_rewards =
            serv_rewards::Keeper::new(collaborators.bank, collaborators.staking, pos.clone(), authority);

        let mut runtime = Self {
            ctx: Context::new(store, BlockHeader::default()),
            pos,
            node_rewards,
            serv_rewards,
        };
        runtime.init_genesis(config)?;

        info!(chain_id = %config.chain_id, "runtime initialised from genesis");
        Ok(runtime)
    }

    fn init_genesis(&mut self, config: &ChainConfig) -> Result<(), DispatchError> {
        let Self {
            ctx,
            pos,
            node_rewards,
            serv_rewards,
        } = self;
        ctx.with_transaction(|ctx| {
            proof_of_service::genesis::init_genesis(pos, ctx, &config.proof_of_service)?;
            node_rewards::genesis::init_genesis(node_rewards, ctx, &config.node_rewards)?;
            serv_rewards::genesis::init_genesis(serv_rewards, ctx, &config.serv_rewards)?;
            Ok(())
        })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn events(&self) -> &[Event] {
        self.ctx.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.ctx.take_events()
    }

    pub fn proof_of_service(&self) -> &proof_of_service::Keeper {
        &self.pos
    }

    pub fn node_rewards(&self) -> &node_rewards::Keeper {
        &self.node_rewards
    }

    pub fn serv_rewards(&self) -> &serv_rewards::Keeper {
        &self.serv_rewards
    }

    pub fn begin_block(&mut self, height: u64, time: u64) -> Result<(), DispatchError> {
        self.ctx.set_header(BlockHeader { height, time });
        let node_rewards = &self.node_rewards;
        self.ctx.with_transaction(|ctx| {
            node_rewards.begin_block(ctx)?;
            Ok(())
        })
    }

    /// Execute one transaction. On error none of its writes or events remain.
    pub fn deliver(&mut self, tx: Transaction) -> Result<TxOutput, DispatchError> {
        let name = tx.name();
        let height = self.ctx.block_height();
        let Self {
            ctx,
            pos,
            node_rewards,
            serv_rewards,
        } = self;

        let result = ctx.with_transaction(|ctx| dispatch(ctx, pos, node_rewards, serv_rewards, tx));
        match &result {
            Ok(_) => debug!(tx = name, height, "transaction applied"),
            Err(e) => debug!(tx = name, height, error = %e, "transaction rejected"),
        }
        result
    }

    pub fn end_block(&mut self) -> Result<(), DispatchError> {
        let Self {
            ctx,
            pos,
            serv_rewards,
            ..
        } = self;
        ctx.with_transaction(|ctx| {
            pos.end_block(ctx)?;
            serv_rewards.end_block(ctx)?;
            Ok(())
        })
    }

    /// Current state of every module in configuration form.
    pub fn export_config(&self, chain_id: &str) -> Result<ChainConfig, DispatchError> {
        Ok(ChainConfig {
            chain_id: chain_id.to_string(),
            governance: self.pos.authority().to_string(),
            proof_of_service: proof_of_service::genesis::export_genesis(&self.pos, &self.ctx)?,
            node_rewards: node_rewards::genesis::export_genesis(&self.node_rewards, &self.ctx)?,
            serv_rewards: serv_rewards::genesis::export_genesis(&self.serv_rewards, &self.ctx)?,
        })
    }
}

fn dispatch(
    ctx: &mut Context,
    pos: &proof_of_service::Keeper,
    node_rewards: &node_rewards::Keeper,
    serv_rewards: &serv_rewards::Keeper,
    tx: Transaction,
) -> Result<TxOutput, DispatchError> {
    match tx {
        Transaction::RegisterProvider {
            provider,
            service_type,
            metadata,
        } => pos.register_provider(ctx, &provider, &service_type, &metadata)?,
        Transaction::SubmitProof {
            provider,
            service_type,
            proof_id,
            evidence,
        } => pos.submit_proof(ctx, &provider, &service_type, &proof_id, evidence)?,
        Transaction::VerifyProof {
            validator,
            provider,
            proof_id,
            is_verified,
            score,
        } => pos.verify_proof(ctx, &validator, &provider, &proof_id, is_verified, score)?,
        Transaction::SetProviderActive {
            authority,
            provider,
            active,
        } => pos.set_provider_active(ctx, &authority, &provider, active)?,
        Transaction::ClaimReward { address } => {
            return Ok(TxOutput::Claimed(serv_rewards.claim_reward(ctx, &address)?));
        }
        Transaction::UpdateServiceParams { authority, params } => {
            pos.update_params(ctx, &authority, params)?
        }
        Transaction::UpdateModifierParams { authority, params } => {
            node_rewards.update_params(ctx, &authority, params)?
        }
        Transaction::UpdateRewardParams { authority, params } => {
            serv_rewards.update_params(ctx, &authority, params)?
        }
    }
    Ok(TxOutput::None)
}
