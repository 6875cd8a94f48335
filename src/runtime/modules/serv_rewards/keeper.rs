use std::{collections::BTreeSet, sync::Arc};

use serv_primitives::{
    decimal, Address, Balance, Context, Event, ServiceScores, StakingLedger, TokenTransfer,
};
use tracing::{debug, info, warn};

use crate::{
    types::{events, keys, AccumulatedRewards, RewardMetrics, RewardParams, DENOM, MODULE_NAME},
    Error, Result, ServRewardsHooks,
};

pub struct Keeper {
    bank: Arc<dyn TokenTransfer>,
    staking: Arc<dyn StakingLedger>,
    scores: Arc<dyn ServiceScores>,
    authority: Address,
    hooks: Vec<Box<dyn ServRewardsHooks>>,
}

impl Keeper {
    pub fn new(
        bank: Arc<dyn TokenTransfer>,
        staking: Arc<dyn StakingLedger>,
        scores: Arc<dyn ServiceScores>,
        authority: Address,
    ) -> Self {
        Self {
            bank,
            staking,
            scores,
            authority,
            hooks: Vec::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: impl ServRewardsHooks + 'static) -> Self {
        self.hooks.push(Box::new(hooks));
        self
    }

    pub fn metrics(&self, ctx: &Context) -> Result<RewardMetrics> {
        Ok(ctx.get_decoded(&keys::metrics())?.unwrap_or_default())
    }

    pub(crate) fn set_metrics(&self, ctx: &mut Context, metrics: &RewardMetrics) {
        ctx.set_encoded(keys::metrics(), metrics);
    }

    pub fn params(&self, ctx: &Context) -> Result<RewardParams> {
        Ok(ctx.get_decoded(&keys::params())?.unwrap_or_default())
    }

    pub(crate) fn set_params(&self, ctx: &mut Context, params: &RewardParams) {
        ctx.set_encoded(keys::params(), params);
    }

    pub fn update_params(&self, ctx: &mut Context, authority: &Address, params: RewardParams) -> Result<()> {
        if authority != &self.authority {
            return Err(Error::Unauthorized(authority.clone()));
        }
        params.validate().map_err(Error::InvalidParams)?;
        self.set_params(ctx, &params);

        ctx.emit(
            Event::new(events::PARAMS_UPDATED)
                .attr("service_score_weight", decimal::format(params.service_score_weight))
                .attr("staking_weight", decimal::format(params.staking_weight))
                .attr("reward_per_epoch", params.reward_per_epoch)
                .attr("epoch_duration", params.epoch_duration),
        );
        info!(epoch_duration = params.epoch_duration, "reward params updated");
        Ok(())
    }

    pub fn accumulated_rewards(&self, ctx: &Context, addr: &Address) -> Result<AccumulatedRewards> {
        Ok(ctx
            .get_decoded(&keys::accumulated(addr))?
            .unwrap_or_else(|| AccumulatedRewards::empty(addr.clone())))
    }

    pub fn all_accumulated_rewards(&self, ctx: &Context) -> Result<Vec<AccumulatedRewards>> {
        Ok(ctx
            .iter_decoded::<AccumulatedRewards>(&keys::accumulated_prefix())?
            .into_iter()
            .map(|(_, rewards)| rewards)
            .collect())
    }

    pub(crate) fn set_accumulated_rewards(&self, ctx: &mut Context, rewards: &AccumulatedRewards) {
        ctx.set_encoded(keys::accumulated(&rewards.address), rewards);
    }

    /// Share of `reward_per_epoch` owed to `addr` under the current metrics.
    ///
    /// Each share is `reward_per_epoch * weight * part / total`; a zero total
    /// makes that share zero. The sum is truncated to an integer.
    pub fn calculate_reward(&self, ctx: &Context, addr: &Address) -> Result<Balance> {
        let params = self.params(ctx)?;
        let metrics = self.metrics(ctx)?;
        let service_score = self.scores.service_score(ctx, addr)?;
        let stake = self.staking.delegator_stake(ctx, addr);

        let pool = decimal::from_integer(params.reward_per_epoch);
        let service_share = decimal::mul_ratio(
            decimal::mul(pool, params.service_score_weight),
            service_score,
            metrics.total_service_score,
        );
        let stake_share = decimal::mul_ratio(
            decimal::mul(pool, params.staking_weight),
            stake,
            metrics.total_staked,
        );

        Ok(decimal::floor(decimal::add(service_share, stake_share)))
    }

    /// Pay out everything accrued to `addr`. At most one claim per epoch.
    ///
    /// Mint, transfer and the ledger update run in one transaction: if the
    /// token collaborator fails nothing is applied.
    pub fn claim_reward(&self, ctx: &mut Context, addr: &Address) -> Result<Balance> {
        ctx.with_transaction(|ctx| {
            let metrics = self.metrics(ctx)?;
            let mut rewards = self.accumulated_rewards(ctx, addr)?;
            if rewards.last_claim == metrics.epoch_number {
                return Err(Error::AlreadyClaimedThisEpoch {
                    address: addr.clone(),
                    epoch: metrics.epoch_number,
                });
            }

            let amount = rewards.rewards;
            if amount > 0 {
                self.bank.mint(ctx, MODULE_NAME, amount).map_err(|e| {
                    warn!(address = %addr, amount = %amount, error = %e, "reward mint failed");
                    Error::TokenTransfer(e)
                })?;
                self.bank.transfer(ctx, MODULE_NAME, addr, amount).map_err(|e| {
                    warn!(address = %addr, amount = %amount, error = %e, "reward transfer failed");
                    Error::TokenTransfer(e)
                })?;
            }

            rewards.rewards = 0;
            rewards.last_claim = metrics.epoch_number;
            self.set_accumulated_rewards(ctx, &rewards);

            ctx.emit(
                Event::new(events::REWARD_CLAIMED)
                    .attr(events::ATTR_ADDRESS, addr)
                    .attr(events::ATTR_AMOUNT, format!("{amount}{DENOM}"))
                    .attr(events::ATTR_EPOCH, metrics.epoch_number),
            );
            debug!(address = %addr, amount = %amount, epoch = metrics.epoch_number, "rewards claimed");
            Ok(amount)
        })
    }

    /// Close the current epoch: bump the counter, snapshot the totals, credit
    /// every participant and notify hooks.
    pub fn advance_epoch(&self, ctx: &mut Context) -> Result<RewardMetrics> {
        let mut metrics = self.metrics(ctx)?;
        metrics.epoch_number += 1;
        metrics.total_service_score = self.scores.total_service_score(ctx)?;
        metrics.total_staked = self.staking.total_bonded_stake(ctx);
        self.set_metrics(ctx, &metrics);

        let mut credited = 0usize;
        for addr in self.participants(ctx)? {
            let reward = self.calculate_reward(ctx, &addr)?;
            if reward == 0 {
                continue;
            }
            let mut rewards = self.accumulated_rewards(ctx, &addr)?;
            rewards.rewards = rewards.rewards.saturating_add(reward);
            self.set_accumulated_rewards(ctx, &rewards);

            ctx.emit(
                Event::new(events::REWARD_ACCRUED)
                    .attr(events::ATTR_ADDRESS, &addr)
                    .attr(events::ATTR_AMOUNT, format!("{reward}{DENOM}"))
                    .attr(events::ATTR_EPOCH, metrics.epoch_number),
            );
            credited += 1;
        }

        ctx.emit(
            Event::new(events::EPOCH_COMPLETED)
                .attr(events::ATTR_EPOCH, metrics.epoch_number)
                .attr(events::ATTR_TOTAL_SERVICE_SCORE, metrics.total_service_score)
                .attr(events::ATTR_TOTAL_STAKED, metrics.total_staked),
        );
        info!(
            epoch = metrics.epoch_number,
            total_service_score = %metrics.total_service_score,
            total_staked = %metrics.total_staked,
            credited,
            "serv rewards epoch completed"
        );

        for hook in &self.hooks {
            hook.after_epoch_completed(ctx, metrics.epoch_number);
        }
        Ok(metrics)
    }

    // Providers and bonded accounts, deduplicated, in address order.
    fn participants(&self, ctx: &Context) -> Result<BTreeSet<Address>> {
        let mut participants: BTreeSet<Address> = self.scores.providers(ctx)?.into_iter().collect();
        participants.extend(self.staking.bonded_accounts(ctx));
        Ok(participants)
    }

    pub fn end_block(&self, ctx: &mut Context) -> Result<()> {
        let params = self.params(ctx)?;
        if ctx.block_height() % params.epoch_duration.max(1) == 0 {
            self.advance_epoch(ctx)?;
        }
        Ok(())
    }
}
