use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serv_primitives::Context;

use crate::{
    types::{AccumulatedRewards, RewardMetrics, RewardParams},
    Error, Keeper, Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub metrics: RewardMetrics,
    pub params: RewardParams,
    pub accumulated: Vec<AccumulatedRewards>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<()> {
        self.params.validate().map_err(Error::InvalidParams)?;

        let mut seen = BTreeSet::new();
        for rewards in &self.accumulated {
            if !seen.insert(&rewards.address) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate accumulated rewards for {}",
                    rewards.address
                )));
            }
            if rewards.last_claim > self.metrics.epoch_number {
                return Err(Error::InvalidArgument(format!(
                    "{} last claimed in epoch {}, after current epoch {}",
                    rewards.address, rewards.last_claim, self.metrics.epoch_number
                )));
            }
        }
        Ok(())
    }
}

pub fn init_genesis(keeper: &Keeper, ctx: &mut Context, genesis: &GenesisState) -> Result<()> {
    genesis.validate()?;
    keeper.set_metrics(ctx, &genesis.metrics);
    keeper.set_params(ctx, &genesis.params);
    for rewards in &genesis.accumulated {
        keeper.set_accumulated_rewards(ctx, rewards);
    }
    Ok(())
}

pub fn export_genesis(keeper: &Keeper, ctx: &Context) -> Result<GenesisState> {
    Ok(GenesisState {
        metrics: keeper.metrics(ctx)?,
        params: keeper.params(ctx)?,
        accumulated: keeper.all_accumulated_rewards(ctx)?,
    })
}
