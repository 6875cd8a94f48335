//! # Proof of Service Module
//!
//! Registry of service providers and ledger of their service proofs.
//!
//! ## Overview
//!
//! Providers offering bandwidth, storage or compute register once and then
//! submit proofs of delivered service. Validators vote on every proof; once
//! `min_verifications` distinct validators have voted and the deciding vote
//! confirms it, the proof becomes verified and its score is credited to the
//! provider exactly once. Scores decay periodically so that old service
//! weighs less than recent service.
//!
//! ## Interface
//!
//! * `register_provider` - Register an address as a provider of a service type
//! * `submit_proof` - Record a new, unverified proof for a registered provider
//! * `verify_proof` - Cast a validator vote on a proof
//! * `decay_service_scores` - Apply the decay rate to every score
//! * `end_block` - Decay scores and prune stale proofs every validity period

use std::sync::Arc;

use serv_primitives::{
    decimal, Address, Balance, Context, ErrorKind, Event, ServiceScores, StoreError, ValidatorSet,
};
use thiserror::Error;
use tracing::{debug, info};

pub mod genesis;
pub mod types;

#[cfg(test)]
mod mock;


pub use genesis::GenesisState;
pub use types::{ServiceParams, ServiceProof, ServiceProvider, ServiceScore};

use types::{events, keys, MAX_PROOF_SCORE};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Service provider {0} already registered")]
    AlreadyRegistered(Address),

    #[error("Service provider {0} not registered")]
    ProviderNotRegistered(Address),

    #[error("Service provider {0} is inactive")]
    ProviderInactive(Address),

    #[error("Proof {proof_id} already submitted by {provider}")]
    ProofAlreadyExists { provider: Address, proof_id: String },

    #[error("Proof {proof_id} of {provider} not found")]
    ProofNotFound { provider: Address, proof_id: String },

    #[error("Proof {proof_id} of {provider} expired before reaching quorum")]
    ProofExpired { provider: Address, proof_id: String },

    #[error("Provider {provider} already submitted {limit} proofs in this window")]
    ProofQuotaExceeded { provider: Address, limit: u32 },

    #[error("Address {0} is not a validator")]
    NotAValidator(Address),

    #[error("Validator {validator} has already verified proof {proof_id}")]
    DuplicateVerification { validator: Address, proof_id: String },

    #[error("Score {0} out of range: scores are at most 100 and the deciding vote needs a nonzero score")]
    InvalidScore(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid service params: {0}")]
    InvalidParams(String),

    #[error("{0} is not the governance authority")]
    Unauthorized(Address),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProviderNotRegistered(_) | Error::ProofNotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyRegistered(_)
            | Error::ProviderInactive(_)
            | Error::ProofAlreadyExists { .. }
            | Error::ProofExpired { .. }
            | Error::ProofQuotaExceeded { .. }
            | Error::DuplicateVerification { .. } => ErrorKind::Conflict,
            Error::InvalidScore(_) | Error::InvalidArgument(_) | Error::InvalidParams(_) => {
                ErrorKind::InvalidArgument
            }
            Error::NotAValidator(_) | Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Store(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Observers notified after state changes of this module.
///
/// Every method has an empty default so observers implement only what they
/// care about.
pub trait ProofOfServiceHooks: Send + Sync {
    fn after_provider_registered(&self, _ctx: &mut Context, _provider: &Address) {}

    fn after_proof_submitted(&self, _ctx: &mut Context, _provider: &Address, _proof_id: &str) {}

    /// Called once, on the vote that turns the proof verified.
    fn after_proof_verified(
        &self,
        _ctx: &mut Context,
        _provider: &Address,
        _proof_id: &str,
        _score: Balance,
    ) {
    }
}

/// Keeper of the proof of service store.
pub struct Keeper {
    validators: Arc<dyn ValidatorSet>,
    authority: Address,
    hooks: Vec<Box<dyn ProofOfServiceHooks>>,
}

impl Keeper {
    pub fn new(validators: Arc<dyn ValidatorSet>, authority: Address) -> Self {
        Self {
            validators,
            authority,
            hooks: Vec::new(),
        }
    }

    /// Register an observer. Observers run in registration order.
    pub fn with_hooks(mut self, hooks: impl ProofOfServiceHooks + 'static) -> Self {
        self.hooks.push(Box::new(hooks));
        self
    }

    pub fn authority(&self) -> &Address {
        &self.authority
    }

    fn ensure_authority(&self, caller: &Address) -> Result<()> {
        if caller != &self.authority {
            return Err(Error::Unauthorized(caller.clone()));
        }
        Ok(())
    }

    pub fn params(&self, ctx: &Context) -> Result<ServiceParams> {
        Ok(ctx.get_decoded(&keys::params())?.unwrap_or_default())
    }

    pub(crate) fn set_params(&self, ctx: &mut Context, params: &ServiceParams) {
        ctx.set_encoded(keys::params(), params);
    }

    /// Replace the parameters. Governance only.
    pub fn update_params(&self, ctx: &mut Context, authority: &Address, params: ServiceParams) -> Result<()> {
        self.ensure_authority(authority)?;
        params.validate().map_err(Error::InvalidParams)?;
        self.set_params(ctx, &params);

        ctx.emit(
            Event::new(events::PARAMS_UPDATED)
                .attr("min_verifications", params.min_verifications)
                .attr(events::ATTR_DECAY_RATE, decimal::format(params.score_decay_rate))
                .attr("proof_validity_period", params.proof_validity_period)
                .attr("max_proofs_per_epoch", params.max_proofs_per_epoch),
        );
        info!(min_verifications = params.min_verifications, "service params updated");
        Ok(())
    }

    pub fn register_provider(
        &self,
        ctx: &mut Context,
        provider: &Address,
        service_type: &str,
        metadata: &str,
    ) -> Result<()> {
        if service_type.is_empty() {
            return Err(Error::InvalidArgument("service type cannot be empty".into()));
        }
        let key = keys::provider(provider);
        if ctx.has(&key) {
            return Err(Error::AlreadyRegistered(provider.clone()));
        }

        let record = ServiceProvider {
            address: provider.clone(),
            service_type: service_type.to_owned(),
            metadata: metadata.to_owned(),
            registered_at: ctx.block_time(),
            active: true,
        };
        ctx.set_encoded(key, &record);
        ctx.set_encoded(keys::score(provider), &ServiceScore::zero(provider.clone()));

        ctx.emit(
            Event::new(events::PROVIDER_REGISTERED)
                .attr(events::ATTR_PROVIDER, provider)
                .attr(events::ATTR_SERVICE_TYPE, service_type),
        );
        debug!(%provider, service_type, "service provider registered");

        for hook in &self.hooks {
            hook.after_provider_registered(ctx, provider);
        }
        Ok(())
    }

    /// Toggle a provider's `active` flag. Governance only.
    pub fn set_provider_active(
        &self,
        ctx: &mut Context,
        authority: &Address,
        provider: &Address,
        active: bool,
    ) -> Result<()> {
        self.ensure_authority(authority)?;
        let mut record = self
            .provider(ctx, provider)?
            .ok_or_else(|| Error::ProviderNotRegistered(provider.clone()))?;
        record.active = active;
        ctx.set_encoded(keys::provider(provider), &record);

        ctx.emit(
            Event::new(events::PROVIDER_STATUS_CHANGED)
                .attr(events::ATTR_PROVIDER, provider)
                .attr(events::ATTR_ACTIVE, active),
        );
        Ok(())
    }

    pub fn provider(&self, ctx: &Context, provider: &Address) -> Result<Option<ServiceProvider>> {
        Ok(ctx.get_decoded(&keys::provider(provider))?)
    }

    /// All providers in address key order, optionally restricted to one service type.
    pub fn providers(&self, ctx: &Context, service_type: Option<&str>) -> Result<Vec<ServiceProvider>> {
        let providers = ctx
            .iter_decoded::<ServiceProvider>(&keys::provider_prefix())?
            .into_iter()
            .map(|(_, provider)| provider)
            .filter(|p| service_type.map_or(true, |t| p.service_type == t))
            .collect();
        Ok(providers)
    }

    pub fn submit_proof(
        &self,
        ctx: &mut Context,
        provider: &Address,
        service_type: &str,
        proof_id: &str,
        evidence: Vec<u8>,
    ) -> Result<()> {
        if service_type.is_empty() {
            return Err(Error::InvalidArgument("service type cannot be empty".into()));
        }
        if proof_id.is_empty() {
            return Err(Error::InvalidArgument("proof id cannot be empty".into()));
        }
        if evidence.is_empty() {
            return Err(Error::InvalidArgument("evidence cannot be empty".into()));
        }

        let record = self
            .provider(ctx, provider)?
            .ok_or_else(|| Error::ProviderNotRegistered(provider.clone()))?;
        if !record.active {
            return Err(Error::ProviderInactive(provider.clone()));
        }

        let key = keys::proof(provider, proof_id);
        if ctx.has(&key) {
            return Err(Error::ProofAlreadyExists {
                provider: provider.clone(),
                proof_id: proof_id.to_owned(),
            });
        }

        let params = self.params(ctx)?;
        let quota_key = keys::quota(
            params.proof_validity_period,
            params.window_of(ctx.block_height()),
            provider,
        );
        let submitted: u32 = ctx.get_decoded(&quota_key)?.unwrap_or(0);
        if submitted >= params.max_proofs_per_epoch {
            return Err(Error::ProofQuotaExceeded {
                provider: provider.clone(),
                limit: params.max_proofs_per_epoch,
            });
        }
        ctx.set_encoded(quota_key, &(submitted + 1));

        let proof = ServiceProof {
            provider: provider.clone(),
            proof_id: proof_id.to_owned(),
            service_type: service_type.to_owned(),
            evidence,
            submitted_at: ctx.block_time(),
            submitted_height: ctx.block_height(),
            verified: false,
            verified_by: Vec::new(),
            score: 0,
        };
        ctx.set_encoded(key, &proof);

        ctx.emit(
            Event::new(events::PROOF_SUBMITTED)
                .attr(events::ATTR_PROVIDER, provider)
                .attr(events::ATTR_PROOF_ID, proof_id)
                .attr(events::ATTR_SERVICE_TYPE, service_type),
        );
        debug!(%provider, proof_id, "proof submitted");

        for hook in &self.hooks {
            hook.after_proof_submitted(ctx, provider, proof_id);
        }
        Ok(())
    }

    pub fn proof(&self, ctx: &Context, provider: &Address, proof_id: &str) -> Result<Option<ServiceProof>> {
        Ok(ctx.get_decoded(&keys::proof(provider, proof_id))?)
    }

    pub fn proofs_by_provider(&self, ctx: &Context, provider: &Address) -> Result<Vec<ServiceProof>> {
        Ok(ctx
            .iter_decoded::<ServiceProof>(&keys::proofs_of(provider))?
            .into_iter()
            .map(|(_, proof)| proof)
            .collect())
    }

    /// Record a validator's vote on a proof.
    ///
    /// The vote is always recorded. The proof turns verified only on the vote
    /// that brings the voter count to `min_verifications` or beyond while
    /// confirming; that vote's score is credited once and must be nonzero.
    /// Votes on an already verified proof never credit again.
    pub fn verify_proof(
        &self,
        ctx: &mut Context,
        validator: &Address,
        provider: &Address,
        proof_id: &str,
        is_verified: bool,
        score: u64,
    ) -> Result<()> {
        if score > MAX_PROOF_SCORE {
            return Err(Error::InvalidScore(score));
        }
        if !self.validators.is_validator(ctx, validator) {
            return Err(Error::NotAValidator(validator.clone()));
        }

        let key = keys::proof(provider, proof_id);
        let mut proof: ServiceProof = ctx.get_decoded(&key)?.ok_or_else(|| Error::ProofNotFound {
            provider: provider.clone(),
            proof_id: proof_id.to_owned(),
        })?;

        if proof.verified_by.contains(validator) {
            return Err(Error::DuplicateVerification {
                validator: validator.clone(),
                proof_id: proof_id.to_owned(),
            });
        }

        let params = self.params(ctx)?;
        if proof.is_expired(ctx.block_height(), params.proof_validity_period) {
            return Err(Error::ProofExpired {
                provider: provider.clone(),
                proof_id: proof_id.to_owned(),
            });
        }

        proof.verified_by.push(validator.clone());

        let reached_quorum = proof.verified_by.len() >= params.min_verifications as usize;
        let newly_verified = !proof.verified && reached_quorum && is_verified;
        // The deciding vote sets the proof's score, which must be nonzero.
        if newly_verified && score == 0 {
            return Err(Error::InvalidScore(score));
        }
        if newly_verified {
            proof.verified = true;
            proof.score = Balance::from(score);
            self.credit_score(ctx, provider, proof.score)?;
        }
        ctx.set_encoded(key, &proof);

        ctx.emit(
            Event::new(events::PROOF_VERIFIED)
                .attr(events::ATTR_VALIDATOR, validator)
                .attr(events::ATTR_PROVIDER, provider)
                .attr(events::ATTR_PROOF_ID, proof_id)
                .attr(events::ATTR_VERIFIED, is_verified)
                .attr(events::ATTR_SCORE, score),
        );
        debug!(
            %validator,
            %provider,
            proof_id,
            votes = proof.verified_by.len(),
            newly_verified,
            "proof vote recorded"
        );

        if newly_verified {
            for hook in &self.hooks {
                hook.after_proof_verified(ctx, provider, proof_id, proof.score);
            }
        }
        Ok(())
    }

    fn credit_score(&self, ctx: &mut Context, provider: &Address, amount: Balance) -> Result<()> {
        let key = keys::score(provider);
        let mut record = ctx
            .get_decoded::<ServiceScore>(&key)?
            .unwrap_or_else(|| ServiceScore::zero(provider.clone()));
        record.score = record.score.saturating_add(amount);
        record.last_updated = ctx.block_height();
        ctx.set_encoded(key, &record);

        let total = self.total_service_score(ctx)?.saturating_add(amount);
        ctx.set_encoded(keys::total_score(), &total);
        Ok(())
    }

    pub fn service_score_record(&self, ctx: &Context, provider: &Address) -> Result<Option<ServiceScore>> {
        Ok(ctx.get_decoded(&keys::score(provider))?)
    }

    pub fn service_score(&self, ctx: &Context, provider: &Address) -> Result<Balance> {
        Ok(self.service_score_record(ctx, provider)?.map_or(0, |s| s.score))
    }

    pub fn service_scores(&self, ctx: &Context) -> Result<Vec<ServiceScore>> {
        Ok(ctx
            .iter_decoded::<ServiceScore>(&keys::score_prefix())?
            .into_iter()
            .map(|(_, score)| score)
            .collect())
    }

    pub fn total_service_score(&self, ctx: &Context) -> Result<Balance> {
        Ok(ctx.get_decoded(&keys::total_score())?.unwrap_or(0))
    }

    /// Multiply every score by `1 - decay_rate`, truncating, then rebuild the
    /// total from the individual scores.
    pub fn decay_service_scores(&self, ctx: &mut Context) -> Result<()> {
        let params = self.params(ctx)?;
        let retained = decimal::sub(decimal::one(), params.score_decay_rate);
        let height = ctx.block_height();

        for (key, mut record) in ctx.iter_decoded::<ServiceScore>(&keys::score_prefix())? {
            record.score = decimal::mul_int(retained, record.score);
            record.last_updated = height;
            ctx.set_encoded(key, &record);
        }
        let total = self.recalculate_total_service_score(ctx)?;

        ctx.emit(
            Event::new(events::SCORES_DECAYED)
                .attr(events::ATTR_DECAY_RATE, decimal::format(params.score_decay_rate))
                .attr(events::ATTR_TOTAL_SCORE, total),
        );
        info!(
            height,
            decay_rate = %decimal::format(params.score_decay_rate),
            total_service_score = %total,
            "service scores decayed"
        );
        Ok(())
    }

    pub(crate) fn recalculate_total_service_score(&self, ctx: &mut Context) -> Result<Balance> {
        let total = ctx
            .iter_decoded::<ServiceScore>(&keys::score_prefix())?
            .into_iter()
            .fold(0u128, |acc, (_, record)| acc.saturating_add(record.score));
        ctx.set_encoded(keys::total_score(), &total);
        Ok(total)
    }

    /// Delete unverified proofs whose validity period has passed and every
    /// quota counter outside the current window. Returns the number of proofs removed.
    pub fn prune_expired_proofs(&self, ctx: &mut Context) -> Result<usize> {
        let params = self.params(ctx)?;
        let height = ctx.block_height();

        let mut pruned = 0;
        for (key, proof) in ctx.iter_decoded::<ServiceProof>(&keys::proof_prefix())? {
            if !proof.is_expired(height, params.proof_validity_period) {
                continue;
            }
            ctx.delete(&key);
            ctx.emit(
                Event::new(events::PROOF_EXPIRED)
                    .attr(events::ATTR_PROVIDER, &proof.provider)
                    .attr(events::ATTR_PROOF_ID, &proof.proof_id),
            );
            pruned += 1;
        }

        let current = (params.proof_validity_period, params.window_of(height));
        for (key, _) in ctx.prefix_iter(&keys::quota_prefix()) {
            let live = keys::decode_quota(&key)
                .map_or(false, |(period, window, _)| (period, window) == current);
            if !live {
                ctx.delete(&key);
            }
        }

        if pruned > 0 {
            info!(height, pruned, "expired proofs pruned");
        }
        Ok(pruned)
    }

    /// Every `proof_validity_period` blocks: decay scores, then prune.
    pub fn end_block(&self, ctx: &mut Context) -> Result<()> {
        let params = self.params(ctx)?;
        if ctx.block_height() % params.proof_validity_period.max(1) != 0 {
            return Ok(());
        }
        self.decay_service_scores(ctx)?;
        self.prune_expired_proofs(ctx)?;
        Ok(())
    }
}

impl ServiceScores for Keeper {
    fn service_score(&self, ctx: &Context, addr: &Address) -> std::result::Result<Balance, StoreError> {
        Ok(ctx
            .get_decoded::<ServiceScore>(&keys::score(addr))?
            .map_or(0, |s| s.score))
    }

    fn total_service_score(&self, ctx: &Context) -> std::result::Result<Balance, StoreError> {
        Ok(ctx.get_decoded(&keys::total_score())?.unwrap_or(0))
    }

    fn providers(&self, ctx: &Context) -> std::result::Result<Vec<Address>, StoreError> {
        Ok(ctx
            .iter_decoded::<ServiceProvider>(&keys::provider_prefix())?
            .into_iter()
            .map(|(_, provider)| provider.address)
            .collect())
    }
}
