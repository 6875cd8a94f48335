use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serv_primitives::{Address, Context};

use crate::{
    types::{keys, ServiceParams, ServiceProof, ServiceProvider, ServiceScore, MAX_PROOF_SCORE},
    Error, Keeper, Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub params: ServiceParams,
    pub providers: Vec<ServiceProvider>,
    pub proofs: Vec<ServiceProof>,
    pub scores: Vec<ServiceScore>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<()> {
        self.params.validate().map_err(Error::InvalidParams)?;

        let mut registered = BTreeSet::new();
        for provider in &self.providers {
            if provider.service_type.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "provider {} has an empty service type",
                    provider.address
                )));
            }
            if !registered.insert(&provider.address) {
                return Err(Error::AlreadyRegistered(provider.address.clone()));
            }
        }

        let mut seen_proofs = BTreeSet::new();
        for proof in &self.proofs {
            ensure_registered(&registered, &proof.provider)?;
            if !seen_proofs.insert((&proof.provider, proof.proof_id.as_str())) {
                return Err(Error::ProofAlreadyExists {
                    provider: proof.provider.clone(),
                    proof_id: proof.proof_id.clone(),
                });
            }
            if proof.verified == (proof.score == 0) {
                return Err(Error::InvalidArgument(format!(
                    "proof {} of {} must carry a score exactly when verified",
                    proof.proof_id, proof.provider
                )));
            }
            if proof.score > u128::from(MAX_PROOF_SCORE) {
                return Err(Error::InvalidArgument(format!(
                    "proof {} of {} has score {} above {}",
                    proof.proof_id, proof.provider, proof.score, MAX_PROOF_SCORE
                )));
            }
            // Quorum may have been raised since, so only require some vote.
            if proof.verified && proof.verified_by.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "proof {} of {} is verified without any validator vote",
                    proof.proof_id, proof.provider
                )));
            }
            let voters: BTreeSet<&Address> = proof.verified_by.iter().collect();
            if voters.len() != proof.verified_by.len() {
                return Err(Error::InvalidArgument(format!(
                    "proof {} of {} lists a validator twice",
                    proof.proof_id, proof.provider
                )));
            }
        }

        let mut scored = BTreeSet::new();
        for score in &self.scores {
            ensure_registered(&registered, &score.provider)?;
            if !scored.insert(&score.provider) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate score entry for {}",
                    score.provider
                )));
            }
        }
        Ok(())
    }
}

fn ensure_registered(registered: &BTreeSet<&Address>, provider: &Address) -> Result<()> {
    if registered.contains(provider) {
        Ok(())
    } else {
        Err(Error::ProviderNotRegistered(provider.clone()))
    }
}

/// Load a validated genesis state. Providers without a score entry start at
/// zero and the total is rebuilt from the stored scores.
pub fn init_genesis(keeper: &Keeper, ctx: &mut Context, genesis: &GenesisState) -> Result<()> {
    genesis.validate()?;
    keeper.set_params(ctx, &genesis.params);

    for provider in &genesis.providers {
        ctx.set_encoded(keys::provider(&provider.address), provider);
        ctx.set_encoded(keys::score(&provider.address), &ServiceScore::zero(provider.address.clone()));
    }
    for proof in &genesis.proofs {
        ctx.set_encoded(keys::proof(&proof.provider, &proof.proof_id), proof);
    }
    for score in &genesis.scores {
        ctx.set_encoded(keys::score(&score.provider), score);
    }
    keeper.recalculate_total_service_score(ctx)?;
    Ok(())
}

pub fn export_genesis(keeper: &Keeper, ctx: &Context) -> Result<GenesisState> {
    let proofs = ctx
        .iter_decoded::<ServiceProof>(&keys::proof_prefix())?
        .into_iter()
        .map(|(_, proof)| proof)
        .collect();

    Ok(GenesisState {
        params: keeper.params(ctx)?,
        providers: keeper.providers(ctx, None)?,
        proofs,
        scores: keeper.service_scores(ctx)?,
    })
}
