// 5.0: funding. traders on the crowded side pay the pool for the imbalance they create,
// and option holders pay the premium (time value) over time.
// 5.1 has the accumulator deltas, 5.2 folds them into a symbol before its price moves.
//
// both accumulators are per unit of volume and grow linearly with elapsed time, so a
// position's debt is simply volume * (accumulator now - accumulator at last touch).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;
use crate::types::Timestamp;

// 5.1: disequilibrium funding per unit of volume.
// coefficient * net_volume * unit_notional^2 / liquidity, per funding period.
// sign follows net volume: a net-long book has longs paying.
pub fn disequilibrium_funding_delta(
    net_volume: Decimal,
    unit_notional: Decimal,
    coefficient: Decimal,
    liquidity_value: Decimal,
    elapsed_secs: Decimal,
    period_secs: Decimal,
) -> Decimal {
    if liquidity_value <= Decimal::ZERO || period_secs <= Decimal::ZERO || elapsed_secs.is_zero() {
        return Decimal::ZERO;
    }
    coefficient * net_volume * unit_notional * unit_notional / liquidity_value * elapsed_secs / period_secs
}

// premium funding per unit of volume. coefficient * (mark - intrinsic) * multiplier, per period.
pub fn premium_funding_delta(
    premium: Decimal,
    multiplier: Decimal,
    coefficient: Decimal,
    elapsed_secs: Decimal,
    period_secs: Decimal,
) -> Decimal {
    if period_secs <= Decimal::ZERO || elapsed_secs.is_zero() {
        return Decimal::ZERO;
    }
    coefficient * premium * multiplier * elapsed_secs / period_secs
}

/// Accumulator moves for one symbol over one interval.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FundingAccrual {
    pub funding_delta: Decimal,
    pub premium_funding_delta: Decimal,
    // what the pool is owed by traders for the interval: net_volume * (deltas)
    pub pool_income: Decimal,
}

impl FundingAccrual {
    pub fn is_zero(&self) -> bool {
        self.funding_delta.is_zero() && self.premium_funding_delta.is_zero()
    }
}

// 5.2: accrual since the symbol's last update, at the symbol's current (old) price
pub fn calculate_accrual(
    symbol: &Symbol,
    liquidity_value: Decimal,
    now: Timestamp,
    period_secs: Decimal,
) -> FundingAccrual {
    let elapsed = symbol.last_update.elapsed_secs(&now);
    let net_volume = symbol.traders_net_volume.value();

    let funding_delta = disequilibrium_funding_delta(
        net_volume,
        symbol.unit_notional(),
        symbol.funding_coefficient,
        liquidity_value,
        elapsed,
        period_secs,
    );

    let premium_funding_delta = if symbol.is_option() {
        premium_funding_delta(
            symbol.premium(),
            symbol.multiplier,
            symbol.premium_funding_coefficient,
            elapsed,
            period_secs,
        )
    } else {
        Decimal::ZERO
    };

    FundingAccrual {
        funding_delta,
        premium_funding_delta,
        pool_income: net_volume * (funding_delta + premium_funding_delta),
    }
}

pub fn apply_accrual(symbol: &mut Symbol, accrual: &FundingAccrual) {
    symbol.cumulative_funding_rate += accrual.funding_delta;
    symbol.cumulative_premium_funding_rate += accrual.premium_funding_delta;
}
