//! Liquidation conditions and reward.
//!
//! An account becomes liquidatable once its equity falls below the maintenance
//! requirement on its total notional. Liquidation closes every position at the mark,
//! pays the liquidator a reward bounded by configured min/max and by what the account
//! still has, and hands the rest of the account (or its deficit) to the pool.

use crate::account::AccountMetrics;
use crate::config::PoolParams;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiquidationStatus {
    /// No open positions.
    Flat,
    Safe { margin_ratio: Decimal },
    Liquidatable { margin_ratio: Decimal, shortfall: Decimal },
    /// Equity already negative, the pool will absorb a loss.
    Bankrupt { deficit: Decimal },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, LiquidationStatus::Liquidatable { .. } | LiquidationStatus::Bankrupt { .. })
    }
}

pub fn evaluate_liquidation(metrics: &AccountMetrics) -> LiquidationStatus {
    let Some(margin_ratio) = metrics.margin_ratio else {
        return LiquidationStatus::Flat;
    };

    if metrics.equity < Decimal::ZERO {
        return LiquidationStatus::Bankrupt {
            deficit: -metrics.equity,
        };
    }

    if !metrics.meets_maintenance() {
        return LiquidationStatus::Liquidatable {
            margin_ratio,
            shortfall: metrics.maintenance_required - metrics.equity,
        };
    }

    LiquidationStatus::Safe { margin_ratio }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidationReward {
    // clamp(cut * notional, min, max)
    pub entitled: Decimal,
    // entitled, capped by the equity actually left
    pub paid: Decimal,
}

pub fn calculate_liquidation_reward(
    notional_closed: Decimal,
    equity: Decimal,
    params: &PoolParams,
) -> LiquidationReward {
    let entitled = (notional_closed.abs() * params.liquidation_cut_ratio)
        .max(params.min_liquidation_reward)
        .min(params.max_liquidation_reward);
    let paid = entitled.min(equity.max(Decimal::ZERO));
    LiquidationReward { entitled, paid }
}
