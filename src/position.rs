// 4.0: open position tracking. cost is the base-denominated entry value, so
// unrealized pnl = volume * unit_notional - cost.
// 4.1 has the fill math at the bottom: same-direction fills add cost, opposite fills realize it.

use crate::symbol::Symbol;
use crate::types::{SignedSize, SymbolId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol_id: SymbolId,
    pub volume: SignedSize,
    pub cost: Decimal,
    pub last_cumulative_funding_rate: Decimal,
    pub last_cumulative_premium_funding_rate: Decimal,
}

impl Position {
    /// Flat position snapshotted at the symbol's current accumulators.
    pub fn new(symbol: &Symbol) -> Self {
        Self {
            symbol_id: symbol.id,
            volume: SignedSize::zero(),
            cost: Decimal::ZERO,
            last_cumulative_funding_rate: symbol.cumulative_funding_rate,
            last_cumulative_premium_funding_rate: symbol.cumulative_premium_funding_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.volume.is_zero()
    }

    pub fn notional(&self, symbol: &Symbol) -> Decimal {
        (self.volume.value() * symbol.unit_notional()).abs()
    }

    pub fn unrealized_pnl(&self, symbol: &Symbol) -> Decimal {
        self.volume.value() * symbol.unit_notional() - self.cost
    }

    // 4.2: funding owed since the last touch. positive = trader pays
    pub fn pending_funding(&self, symbol: &Symbol) -> Decimal {
        let diseq = symbol.cumulative_funding_rate - self.last_cumulative_funding_rate;
        let premium = symbol.cumulative_premium_funding_rate - self.last_cumulative_premium_funding_rate;
        self.volume.value() * (diseq + premium)
    }

    /// Returns the funding owed and advances both snapshots.
    pub fn settle_funding(&mut self, symbol: &Symbol) -> Decimal {
        let owed = self.pending_funding(symbol);
        self.last_cumulative_funding_rate = symbol.cumulative_funding_rate;
        self.last_cumulative_premium_funding_rate = symbol.cumulative_premium_funding_rate;
        owed
    }
}

/// Outcome of applying a fill to a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    // delta_volume * unit_notional
    pub cur_cost: Decimal,
    // cost taken off the books by the closing part of the fill. the trader pays it
    // (negative = trader receives), the pool receives it
    pub realized_cost: Decimal,
    pub new_volume: SignedSize,
    pub new_cost: Decimal,
}

impl Fill {
    /// Trader-side realized pnl of the fill.
    pub fn realized_pnl(&self) -> Decimal {
        -self.realized_cost
    }
}

// 4.3: |volume| grows. same direction, or a flip past zero to a larger size
pub fn increases_exposure(volume: SignedSize, delta_volume: Decimal) -> bool {
    volume.add(delta_volume).abs() > volume.abs()
}

// 4.4: the fill formula.
// same direction: cost accumulates (weighted average entry).
// opposite direction, |volume| <= |delta|: whole position closes, the excess opens fresh.
// opposite direction, |volume| > |delta|: the closed fraction of cost is realized.
pub fn calculate_fill(volume: SignedSize, cost: Decimal, delta_volume: Decimal, unit_notional: Decimal) -> Fill {
    let cur_cost = delta_volume * unit_notional;

    let realized_cost = if volume.same_direction(delta_volume) {
        Decimal::ZERO
    } else if volume.abs() <= delta_volume.abs() {
        cur_cost * volume.abs() / delta_volume.abs() + cost
    } else {
        cost * delta_volume.abs() / volume.abs() + cur_cost
    };

    Fill {
        cur_cost,
        realized_cost,
        new_volume: volume.add(delta_volume),
        new_cost: cost + cur_cost - realized_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{SymbolQuote, SymbolSpec};
    use crate::types::{Price, Timestamp};
    use rust_decimal_macros::dec;

    fn btc_at(price: Decimal) -> Symbol {
        Symbol::new(
            SymbolId(0),
            SymbolSpec::futures("BTCUSD", dec!(0.0001), dec!(0.0001), dec!(0.00001)),
            SymbolQuote {
                spot: Price::new_unchecked(price),
                mark: price,
                intrinsic_value: Decimal::ZERO,
            },
            Timestamp::default(),
        )
    }

    #[test]
    fn open_from_flat() {
        let fill = calculate_fill(SignedSize::zero(), Decimal::ZERO, dec!(100), dec!(6));
        assert_eq!(fill.cur_cost, dec!(600));
        assert_eq!(fill.realized_cost, Decimal::ZERO);
        assert_eq!(fill.new_volume.value(), dec!(100));
        assert_eq!(fill.new_cost, dec!(600));
    }

    #[test]
    fn increase_accumulates_cost() {
        let fill = calculate_fill(SignedSize::new(dec!(100)), dec!(600), dec!(50), dec!(6.1));
        assert_eq!(fill.new_cost, dec!(905));
        assert_eq!(fill.realized_cost, Decimal::ZERO);
    }

    #[test]
    fn full_close_at_profit() {
        // long 100 from 6.0, close at 6.1
        let fill = calculate_fill(SignedSize::new(dec!(100)), dec!(600), dec!(-100), dec!(6.1));
        assert_eq!(fill.realized_cost, dec!(-10));
        assert_eq!(fill.realized_pnl(), dec!(10));
        assert!(fill.new_volume.is_zero());
        assert_eq!(fill.new_cost, Decimal::ZERO);
    }

    #[test]
    fn partial_close_keeps_entry() {
        // short 100 from 6.0, buy back 40 at 5.9
        let fill = calculate_fill(SignedSize::new(dec!(-100)), dec!(-600), dec!(40), dec!(5.9));
        assert_eq!(fill.realized_cost, dec!(-4));
        assert_eq!(fill.new_volume.value(), dec!(-60));
        // remaining 60 still carried at 6.0
        assert_eq!(fill.new_cost, dec!(-360));
    }

    #[test]
    fn flip_closes_then_opens() {
        // long 100 from 6.0, sell 150 at 5.8
        let fill = calculate_fill(SignedSize::new(dec!(100)), dec!(600), dec!(-150), dec!(5.8));
        assert_eq!(fill.realized_cost, dec!(20));
        assert_eq!(fill.new_volume.value(), dec!(-50));
        assert_eq!(fill.new_cost, dec!(-290));
    }

    #[test]
    fn exposure_direction() {
        assert!(increases_exposure(SignedSize::zero(), dec!(1)));
        assert!(increases_exposure(SignedSize::new(dec!(10)), dec!(1)));
        assert!(!increases_exposure(SignedSize::new(dec!(10)), dec!(-4)));
        // flip to a smaller opposite size reduces |volume|
        assert!(!increases_exposure(SignedSize::new(dec!(10)), dec!(-15)));
        assert!(increases_exposure(SignedSize::new(dec!(10)), dec!(-25)));
    }

    #[test]
    fn unrealized_and_funding() {
        let mut symbol = btc_at(dec!(61000));
        let mut position = Position::new(&symbol);
        position.volume = SignedSize::new(dec!(100));
        position.cost = dec!(600);

        assert_eq!(position.notional(&symbol), dec!(610));
        assert_eq!(position.unrealized_pnl(&symbol), dec!(10));

        symbol.cumulative_funding_rate = dec!(0.002);
        assert_eq!(position.pending_funding(&symbol), dec!(0.2));
        assert_eq!(position.settle_funding(&symbol), dec!(0.2));
        assert_eq!(position.pending_funding(&symbol), Decimal::ZERO);
    }
}
