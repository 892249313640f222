//! Trade execution against the pool.
//!
//! The pool is every trader's counterparty at the refreshed mark. A trade settles the
//! account's funding, charges the fee, realizes cost on the closing part of the fill
//! and hands both to LPs. Only trades that grow `|volume|` are margin-checked.

use super::core::{ensure_amount, Pool};
use super::results::{PoolError, TradeResult};
use crate::events::{EventPayload, TradeEvent};
use crate::position::{calculate_fill, increases_exposure, Position};
use crate::types::{AccountId, BTokenId, Side, SymbolId};
use rust_decimal::Decimal;

impl Pool {
    pub fn trade(
        &mut self,
        account: AccountId,
        symbol_id: SymbolId,
        delta_volume: Decimal,
    ) -> Result<TradeResult, PoolError> {
        let precheck = ensure_amount("volume", delta_volume.abs())
            .map_err(|_| PoolError::InvalidAmount {
                what: "volume",
                value: delta_volume,
            })
            .and_then(|_| self.state.symbols.get(symbol_id).map(|_| ()));
        self.check("trade", precheck)?;

        self.transact_quoted("trade", |s| {
            let funding_paid = s.state.settle_account_funding(account);

            let symbol = s.state.symbols.get(symbol_id)?;
            let (price, unit_notional, fee_ratio, close_only) =
                (symbol.price, symbol.unit_notional(), symbol.fee_ratio, symbol.close_only);
            let position = s
                .state
                .margin_ledger
                .get(account)
                .and_then(|a| a.get_position(symbol_id))
                .cloned()
                .unwrap_or_else(|| Position::new(symbol));

            let growing = increases_exposure(position.volume, delta_volume);
            if close_only && growing {
                return Err(PoolError::CloseOnlyViolation {
                    symbol_id,
                    volume: position.volume,
                    delta: delta_volume,
                });
            }

            if delta_volume.checked_mul(unit_notional).is_none() {
                return Err(PoolError::InvalidAmount {
                    what: "trade notional",
                    value: delta_volume,
                });
            }
            let fill = calculate_fill(position.volume, position.cost, delta_volume, unit_notional);
            let fee = fill.cur_cost.abs() * fee_ratio;
            let protocol_fee = fee * s.state.params.protocol_fee_collect_ratio;

            // 8.3.1: trader side
            let was_open = !position.is_empty();
            let mut position = position;
            position.volume = fill.new_volume;
            position.cost = fill.new_cost;
            let now_open = !position.is_empty();

            let margin = s.state.margin_ledger.entry(account);
            margin.debit(BTokenId::BASE, fee + fill.realized_cost);
            margin.set_position(position);
            s.state.cover_base_debt(account)?;

            // 8.3.2: aggregates
            let symbol = s.state.symbols.get_mut(symbol_id)?;
            symbol.traders_net_volume = symbol.traders_net_volume.add(delta_volume);
            symbol.traders_net_cost += fill.cur_cost - fill.realized_cost;
            match (was_open, now_open) {
                (false, true) => symbol.position_holders += 1,
                (true, false) => symbol.position_holders = symbol.position_holders.saturating_sub(1),
                _ => {}
            }

            // 8.3.3: pool side
            s.state.protocol_fee.uncollected += protocol_fee;
            s.distribute_pnl(fee - protocol_fee + fill.realized_cost);

            if growing {
                if let Some(metrics) = s.state.account_metrics(account) {
                    if !metrics.meets_initial() {
                        return Err(PoolError::InsufficientMargin {
                            required: metrics.initial_required,
                            available: metrics.equity,
                        });
                    }
                }
                s.state.check_pool_margin()?;
            }
            s.state.margin_ledger.remove_if_empty(account);

            let side = if delta_volume > Decimal::ZERO { Side::Long } else { Side::Short };
            s.emit(EventPayload::Trade(TradeEvent {
                account_id: account,
                symbol_id,
                side,
                volume: delta_volume.abs(),
                price,
                cost: fill.cur_cost,
                fee,
                realized_cost: fill.realized_cost,
                new_volume: fill.new_volume,
            }));

            Ok(TradeResult {
                symbol_id,
                price,
                cost: fill.cur_cost,
                fee,
                protocol_fee,
                realized_pnl: fill.realized_pnl(),
                funding_paid,
                new_volume: fill.new_volume,
            })
        })
    }
}
