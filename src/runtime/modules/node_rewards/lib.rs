//! # Node Rewards Module
//!
//! Tracks a performance snapshot for every active validator and turns it into
//! a bounded multiplier on the validator's base staking reward.
//!
//! Each block, before any reward logic runs, `begin_block` refreshes the
//! snapshot of every active validator: its service score from the proof of
//! service ledger, its uptime from the signing window, and its response time.
//! `calculate_modifier` then weighs the three into a value between
//! `min_modifier` and `max_modifier`.

use std::sync::Arc;

use serv_primitives::{
    decimal::{self, Decimal},
    Address, Context, ErrorKind, Event, ServiceScores, StoreError, ValidatorSet,
};
use thiserror::Error;
use tracing::{debug, info};

pub mod genesis;
pub mod types;

#[cfg(test)]
mod mock;


pub use genesis::GenesisState;
pub use types::{NodePerformance, RewardModifierParams};

use types::{events, keys, DEFAULT_RESPONSE_TIME_MS, RESPONSE_TIME_CEILING_MS};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid reward modifier params: {0}")]
    InvalidParams(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} is not the governance authority")]
    Unauthorized(Address),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParams(_) | Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Store(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait NodeRewardsHooks: Send + Sync {
    fn after_performance_updated(&self, ctx: &mut Context, validator: &Address, performance: &NodePerformance);
}

pub struct Keeper {
    validators: Arc<dyn ValidatorSet>,
    scores: Arc<dyn ServiceScores>,
    authority: Address,
    hooks: Vec<Box<dyn NodeRewardsHooks>>,
}

impl Keeper {
    pub fn new(validators: Arc<dyn ValidatorSet>, scores: Arc<dyn ServiceScores>, authority: Address) -> Self {
        Self {
            validators,
            scores,
            authority,
            hooks: Vec::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: impl NodeRewardsHooks + 'static) -> Self {
        self.hooks.push(Box::new(hooks));
        self
    }

    pub fn params(&self, ctx: &Context) -> Result<RewardModifierParams> {
        Ok(ctx.get_decoded(&keys::params())?.unwrap_or_default())
    }

    pub(crate) fn set_params(&self, ctx: &mut Context, params: &RewardModifierParams) {
        ctx.set_encoded(keys::params(), params);
    }

    pub fn update_params(
        &self,
        ctx: &mut Context,
        authority: &Address,
        params: RewardModifierParams,
    ) -> Result<()> {
        if authority != &self.authority {
            return Err(Error::Unauthorized(authority.clone()));
        }
        params.validate().map_err(Error::InvalidParams)?;
        self.set_params(ctx, &params);

        ctx.emit(
            Event::new(events::PARAMS_UPDATED)
                .attr("service_score_weight", decimal::format(params.service_score_weight))
                .attr("uptime_weight", decimal::format(params.uptime_weight))
                .attr("response_time_weight", decimal::format(params.response_time_weight))
                .attr("min_modifier", decimal::format(params.min_modifier))
                .attr("max_modifier", decimal::format(params.max_modifier)),
        );
        info!(
            min_modifier = %decimal::format(params.min_modifier),
            max_modifier = %decimal::format(params.max_modifier),
            "reward modifier params updated"
        );
        Ok(())
    }

    /// Stored snapshot, or the initial one if the validator was never measured.
    pub fn performance(&self, ctx: &Context, validator: &Address) -> Result<NodePerformance> {
        Ok(ctx
            .get_decoded(&keys::performance(validator))?
            .unwrap_or_else(|| NodePerformance::initial(validator.clone())))
    }

    pub fn performances(&self, ctx: &Context) -> Result<Vec<NodePerformance>> {
        Ok(ctx
            .iter_decoded::<NodePerformance>(&keys::performance_prefix())?
            .into_iter()
            .map(|(_, performance)| performance)
            .collect())
    }

    pub(crate) fn set_performance(&self, ctx: &mut Context, performance: &NodePerformance) {
        ctx.set_encoded(keys::performance(&performance.validator), performance);
    }

    /// Refresh the snapshot of one validator at the current height.
    pub fn update_performance(&self, ctx: &mut Context, validator: &Address) -> Result<NodePerformance> {
        let mut performance = self.performance(ctx, validator)?;
        performance.service_score = self.scores.service_score(ctx, validator)?;

        if let Some(uptime) = self.uptime(ctx, validator) {
            performance.uptime_percent = uptime;
        }
        performance.response_time = DEFAULT_RESPONSE_TIME_MS;
        performance.last_update_height = ctx.block_height();
        self.set_performance(ctx, &performance);

        ctx.emit(
            Event::new(events::NODE_PERFORMANCE_UPDATED)
                .attr(events::ATTR_VALIDATOR, validator)
                .attr(events::ATTR_SERVICE_SCORE, performance.service_score)
                .attr(events::ATTR_UPTIME, decimal::format(performance.uptime_percent))
                .attr(events::ATTR_RESPONSE_TIME, performance.response_time),
        );
        debug!(
            %validator,
            service_score = %performance.service_score,
            uptime = %decimal::format(performance.uptime_percent),
            "node performance updated"
        );

        for hook in &self.hooks {
            hook.after_performance_updated(ctx, validator, &performance);
        }
        Ok(performance)
    }

    // 1 - missed / window, clamped to [0, 1]. None without signing info or window.
    fn uptime(&self, ctx: &Context, validator: &Address) -> Option<Decimal> {
        let missed = self.validators.missed_blocks(ctx, validator)?;
        let window = self.validators.signing_window(ctx, validator);
        if window == 0 {
            return None;
        }
        let signed = window.saturating_sub(missed);
        Some(decimal::ratio(u128::from(signed), u128::from(window)))
    }

    pub fn update_all_performances(&self, ctx: &mut Context) -> Result<()> {
        for validator in self.validators.active_validators(ctx) {
            self.update_performance(ctx, &validator)?;
        }
        Ok(())
    }

    pub fn begin_block(&self, ctx: &mut Context) -> Result<()> {
        self.update_all_performances(ctx)
    }

    /// Multiplier in `[min_modifier, max_modifier]` for the validator's last snapshot.
    pub fn calculate_modifier(&self, ctx: &Context, validator: &Address) -> Result<Decimal> {
        let params = self.params(ctx)?;
        let performance = self.performance(ctx, validator)?;
        let total = self.scores.total_service_score(ctx)?.max(1);

        let normalized_service = decimal::ratio(performance.service_score, total);
        let response_score = decimal::ratio(
            u128::from(RESPONSE_TIME_CEILING_MS.saturating_sub(performance.response_time)),
            u128::from(RESPONSE_TIME_CEILING_MS),
        );

        let weighted = decimal::add(
            decimal::add(
                decimal::mul(normalized_service, params.service_score_weight),
                decimal::mul(performance.uptime_percent, params.uptime_weight),
            ),
            decimal::mul(response_score, params.response_time_weight),
        );
        let spread = decimal::sub(params.max_modifier, params.min_modifier);
        let modifier = decimal::add(params.min_modifier, decimal::mul(weighted, spread));

        Ok(decimal::clamp(modifier, params.min_modifier, params.max_modifier))
    }

    /// `base_reward * modifier`, truncated.
    pub fn modify_reward(&self, ctx: &mut Context, validator: &Address, base_reward: Decimal) -> Result<Decimal> {
        let modifier = self.calculate_modifier(ctx, validator)?;
        let modified = decimal::mul(base_reward, modifier);

        ctx.emit(
            Event::new(events::REWARD_MODIFIED)
                .attr(events::ATTR_VALIDATOR, validator)
                .attr(events::ATTR_BASE_REWARD, decimal::format(base_reward))
                .attr(events::ATTR_MODIFIER, decimal::format(modifier))
                .attr(events::ATTR_MODIFIED_REWARD, decimal::format(modified)),
        );
        Ok(modified)
    }
}
