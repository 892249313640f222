//! Liquidation detection and execution.

use super::core::Pool;
use super::results::{LiquidationResult, PoolError};
use crate::events::{EventPayload, LiquidationEvent};
use crate::liquidation::{calculate_liquidation_reward, evaluate_liquidation};
use crate::position::calculate_fill;
use crate::types::{AccountId, BTokenId};
use rust_decimal::Decimal;

impl Pool {
    /// Accounts under maintenance margin at the last refreshed prices.
    pub fn liquidatable_accounts(&self) -> Vec<AccountId> {
        self.state
            .margin_ledger
            .iter()
            .filter(|account| account.has_positions())
            .filter_map(|account| {
                let metrics = self.state.account_metrics(account.owner)?;
                evaluate_liquidation(&metrics).is_liquidatable().then_some(account.owner)
            })
            .collect()
    }

    /// Closes every position of `trader` at the mark, converts its collateral to base,
    /// pays `liquidator` the reward and hands what is left (or missing) to the LPs.
    pub fn liquidate(&mut self, liquidator: AccountId, trader: AccountId) -> Result<LiquidationResult, PoolError> {
        let qualified = self.ensure_active("liquidate").and_then(|_| {
            if self.collaborators.may_liquidate(liquidator) {
                Ok(())
            } else {
                Err(PoolError::Unauthorized {
                    action: "liquidate",
                    reason: "liquidator is not qualified",
                })
            }
        });
        self.check("liquidate", qualified)?;

        self.transact_quoted("liquidate", |s| {
            s.state.settle_account_funding(trader);

            let metrics = s.state.account_metrics(trader).ok_or(PoolError::NotLiquidatable {
                account: trader,
                margin_ratio: None,
            })?;
            if !evaluate_liquidation(&metrics).is_liquidatable() {
                return Err(PoolError::NotLiquidatable {
                    account: trader,
                    margin_ratio: metrics.margin_ratio,
                });
            }

            let mut margin = s.state.margin_ledger.remove(trader).ok_or(PoolError::NotLiquidatable {
                account: trader,
                margin_ratio: None,
            })?;

            // 6.1: close everything at the mark, no fee
            let mut symbols_closed = Vec::new();
            let mut notional_closed = Decimal::ZERO;
            let mut pool_pnl = Decimal::ZERO;

            for (symbol_id, position) in std::mem::take(&mut margin.positions) {
                let symbol = s.state.symbols.get_mut(symbol_id)?;
                let delta = -position.volume.value();
                let fill = calculate_fill(position.volume, position.cost, delta, symbol.unit_notional());

                margin.debit(BTokenId::BASE, fill.realized_cost);
                symbol.traders_net_volume = symbol.traders_net_volume.add(delta);
                symbol.traders_net_cost += fill.cur_cost - fill.realized_cost;
                symbol.position_holders = symbol.position_holders.saturating_sub(1);

                pool_pnl += fill.realized_cost;
                notional_closed += fill.cur_cost.abs();
                symbols_closed.push(symbol_id);
            }
            margin.active_symbol_ids.clear();

            // 6.2: everything to base at the quoted rate
            for (b_token_id, amount) in margin.non_base_collateral() {
                let base_amount = amount * s.state.b_tokens.get(b_token_id)?.price;
                s.state.vault.convert_to_base(b_token_id, amount, base_amount)?;
                margin.debit(b_token_id, amount);
                margin.credit(BTokenId::BASE, base_amount);
            }

            // 6.3: reward out of what is left, the rest belongs to the pool
            let equity = margin.margin(BTokenId::BASE);
            let reward = calculate_liquidation_reward(notional_closed, metrics.equity, &s.state.params);
            if reward.paid > Decimal::ZERO {
                s.state.vault.withdraw(BTokenId::BASE, reward.paid)?;
            }
            let pool_residual = equity - reward.paid;
            s.distribute_pnl(pool_pnl + pool_residual);

            s.emit(EventPayload::Liquidation(LiquidationEvent {
                account_id: trader,
                liquidator,
                symbols_closed: symbols_closed.clone(),
                notional_closed,
                margin_before: metrics.equity,
                reward: reward.paid,
                pool_residual,
            }));

            Ok(LiquidationResult {
                account_id: trader,
                liquidator,
                symbols_closed,
                notional_closed,
                margin_before: metrics.equity,
                reward: reward.paid,
                pool_residual,
            })
        })
    }
}
