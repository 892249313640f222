//! Margin requirements.
//!
//! Requirements scale linearly with the account's total notional across every active
//! symbol: initial margin gates opening or growing exposure, maintenance margin gates
//! liquidation. Both ratios are pool-wide parameters.

use crate::config::PoolParams;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginRequirement {
    pub notional: Decimal,
    pub initial: Decimal,
    pub maintenance: Decimal,
}

pub fn calculate_margin_requirement(total_notional: Decimal, params: &PoolParams) -> MarginRequirement {
    MarginRequirement {
        notional: total_notional,
        initial: total_notional * params.min_initial_margin_ratio,
        maintenance: total_notional * params.min_maintenance_margin_ratio,
    }
}

/// Equity over notional. None for a flat account.
pub fn margin_ratio(equity: Decimal, notional: Decimal) -> Option<Decimal> {
    if notional <= Decimal::ZERO {
        None
    } else {
        Some(equity / notional)
    }
}

/// Pool-side requirement: LP equity must back traders' net notional.
pub fn pool_margin_required(net_notional: Decimal, params: &PoolParams) -> Decimal {
    net_notional * params.min_pool_margin_ratio
}
