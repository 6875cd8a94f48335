use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serv_primitives::{decimal, Context};

use crate::{
    types::{NodePerformance, RewardModifierParams},
    Error, Keeper, Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub params: RewardModifierParams,
    pub performances: Vec<NodePerformance>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<()> {
        self.params.validate().map_err(Error::InvalidParams)?;

        let mut seen = BTreeSet::new();
        for performance in &self.performances {
            if !seen.insert(&performance.validator) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate validator address: {}",
                    performance.validator
                )));
            }
            if performance.uptime_percent > decimal::one() {
                return Err(Error::InvalidArgument(format!(
                    "uptime percent must be between 0 and 1: {}",
                    decimal::format(performance.uptime_percent)
                )));
            }
        }
        Ok(())
    }
}

pub fn init_genesis(keeper: &Keeper, ctx: &mut Context, genesis: &GenesisState) -> Result<()> {
    genesis.validate()?;
    keeper.set_params(ctx, &genesis.params);
    for performance in &genesis.performances {
        keeper.set_performance(ctx, performance);
    }
    Ok(())
}

pub fn export_genesis(keeper: &Keeper, ctx: &Context) -> Result<GenesisState> {
    Ok(GenesisState {
        params: keeper.params(ctx)?,
        performances: keeper.performances(ctx)?,
    })
}
