//! Quote phase and price refresh.
//!
//! Every collaborator read for an operation happens in [`Pool::quote`], before the
//! ledger is staged. Applying the quotes to the staged ledger accrues funding over the
//! elapsed interval at the old prices, then overwrites them.

use super::core::{Pool, Staging};
use super::results::PoolError;
use crate::collaborators::{CollaboratorError, Collaborators};
use crate::events::{EventPayload, FundingAccruedEvent};
use crate::funding::{apply_accrual, calculate_accrual};
use crate::symbol::{SymbolKind, SymbolQuote};
use crate::types::{BTokenId, SymbolId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Everything read from collaborators for one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleQuotes {
    pub symbols: BTreeMap<SymbolId, SymbolQuote>,
    // base value of one unit, non-base bTokens only
    pub b_token_prices: BTreeMap<BTokenId, Decimal>,
}

/// Spot from the price oracle. options add the pricer's time value on top of intrinsic.
pub fn quote_symbol(
    collaborators: &Collaborators,
    symbol_id: SymbolId,
    kind: SymbolKind,
) -> Result<SymbolQuote, CollaboratorError> {
    let spot = collaborators.price_oracle.get_price(symbol_id)?;
    let intrinsic_value = kind.intrinsic_value(spot.value());

    let mark = match kind {
        SymbolKind::Futures => spot.value(),
        SymbolKind::Option { strike, is_call } => {
            let volatility = collaborators.volatility(symbol_id)?;
            let time_value = collaborators.time_value(spot, strike, volatility, is_call)?;
            if time_value < Decimal::ZERO {
                return Err(CollaboratorError::PricingFailed {
                    reason: format!("negative time value {time_value} for {symbol_id}"),
                });
            }
            intrinsic_value + time_value
        }
    };

    Ok(SymbolQuote {
        spot,
        mark,
        intrinsic_value,
    })
}

impl Pool {
    pub(super) fn quote(&self) -> Result<OracleQuotes, PoolError> {
        let mut quotes = OracleQuotes::default();
        for symbol in self.state.symbols.iter() {
            quotes
                .symbols
                .insert(symbol.id, quote_symbol(&self.collaborators, symbol.id, symbol.kind)?);
        }
        for b_token in self.state.b_tokens.iter().filter(|t| !t.id.is_base()) {
            quotes
                .b_token_prices
                .insert(b_token.id, self.collaborators.unit_rate(b_token.id)?);
        }
        Ok(quotes)
    }

    /// Accrues funding on every symbol up to now and refreshes all prices.
    pub fn update_prices(&mut self) -> Result<(), PoolError> {
        self.transact_quoted("update_prices", |_| Ok(()))
    }
}

impl Staging {
    pub(super) fn apply_quotes(&mut self, quotes: &OracleQuotes) -> Result<(), PoolError> {
        for (b_token_id, price) in &quotes.b_token_prices {
            self.state.b_tokens.get_mut(*b_token_id)?.price = *price;
        }

        // one liquidity figure for the whole refresh, so symbol order does not matter
        let liquidity = self.state.funding_liquidity();
        let period = self.state.params.funding_period();
        let now = self.now;

        let mut pool_income = Decimal::ZERO;
        let mut accrued = Vec::new();

        for symbol in self.state.symbols.iter_mut() {
            let Some(quote) = quotes.symbols.get(&symbol.id) else {
                continue;
            };
            let accrual = calculate_accrual(symbol, liquidity, now, period);
            apply_accrual(symbol, &accrual);
            symbol.apply_quote(*quote, now);

            if !accrual.is_zero() {
                pool_income += accrual.pool_income;
                accrued.push(FundingAccruedEvent {
                    symbol_id: symbol.id,
                    funding_delta: accrual.funding_delta,
                    premium_funding_delta: accrual.premium_funding_delta,
                    cumulative_funding_rate: symbol.cumulative_funding_rate,
                    cumulative_premium_funding_rate: symbol.cumulative_premium_funding_rate,
                    pool_income: accrual.pool_income,
                });
            }
        }

        for event in accrued {
            self.emit(EventPayload::FundingAccrued(event));
        }
        self.distribute_pnl(pool_income);
        Ok(())
    }
}
