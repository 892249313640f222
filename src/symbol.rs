// 12.0: symbol (market) config + runtime state.
// 12.1 SymbolRegistry is the arena of live symbols. ids of removed symbols are reused.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::PoolError;
use crate::registry::Slab;
use crate::types::{Price, SignedSize, SymbolId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Futures,
    Option { strike: Decimal, is_call: bool },
}

impl SymbolKind {
    /// Exercise value at `spot`. zero for futures.
    pub fn intrinsic_value(&self, spot: Decimal) -> Decimal {
        match *self {
            SymbolKind::Futures => Decimal::ZERO,
            SymbolKind::Option { strike, is_call: true } => (spot - strike).max(Decimal::ZERO),
            SymbolKind::Option { strike, is_call: false } => (strike - spot).max(Decimal::ZERO),
        }
    }
}

/// Registration parameters for a new symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub name: String,
    pub kind: SymbolKind,
    // underlying units per unit of volume
    pub multiplier: Decimal,
    pub fee_ratio: Decimal,
    pub funding_coefficient: Decimal,
    // options only, ignored for futures
    pub premium_funding_coefficient: Decimal,
}

impl SymbolSpec {
    pub fn futures(name: impl Into<String>, multiplier: Decimal, fee_ratio: Decimal, funding_coefficient: Decimal) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Futures,
            multiplier,
            fee_ratio,
            funding_coefficient,
            premium_funding_coefficient: Decimal::ZERO,
        }
    }

    pub fn option(
        name: impl Into<String>,
        strike: Decimal,
        is_call: bool,
        multiplier: Decimal,
        fee_ratio: Decimal,
        funding_coefficient: Decimal,
        premium_funding_coefficient: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Option { strike, is_call },
            multiplier,
            fee_ratio,
            funding_coefficient,
            premium_funding_coefficient,
        }
    }

    pub fn params(&self) -> SymbolParams {
        SymbolParams {
            fee_ratio: self.fee_ratio,
            funding_coefficient: self.funding_coefficient,
            premium_funding_coefficient: self.premium_funding_coefficient,
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.multiplier <= Decimal::ZERO {
            return Err(PoolError::InvalidAmount {
                what: "multiplier",
                value: self.multiplier,
            });
        }
        if let SymbolKind::Option { strike, .. } = self.kind {
            if strike <= Decimal::ZERO {
                return Err(PoolError::InvalidAmount { what: "strike", value: strike });
            }
        }
        self.params().validate()
    }
}

/// The adjustable part of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolParams {
    pub fee_ratio: Decimal,
    pub funding_coefficient: Decimal,
    pub premium_funding_coefficient: Decimal,
}

impl SymbolParams {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.fee_ratio < Decimal::ZERO || self.fee_ratio >= Decimal::ONE {
            return Err(PoolError::InvalidAmount {
                what: "fee ratio",
                value: self.fee_ratio,
            });
        }
        if self.funding_coefficient < Decimal::ZERO {
            return Err(PoolError::InvalidAmount {
                what: "funding coefficient",
                value: self.funding_coefficient,
            });
        }
        if self.premium_funding_coefficient < Decimal::ZERO {
            return Err(PoolError::InvalidAmount {
                what: "premium funding coefficient",
                value: self.premium_funding_coefficient,
            });
        }
        Ok(())
    }
}

/// Mark, spot and intrinsic value from one quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolQuote {
    pub spot: Price,
    // intrinsic + time value for options, spot for futures
    pub mark: Decimal,
    pub intrinsic_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub multiplier: Decimal,
    pub fee_ratio: Decimal,
    pub funding_coefficient: Decimal,
    pub premium_funding_coefficient: Decimal,
    // mark price the ledger trades and values at
    pub price: Decimal,
    pub spot: Price,
    pub intrinsic_value: Decimal,
    pub cumulative_funding_rate: Decimal,
    pub cumulative_premium_funding_rate: Decimal,
    pub traders_net_volume: SignedSize,
    pub traders_net_cost: Decimal,
    pub position_holders: u32,
    pub close_only: bool,
    pub last_update: Timestamp,
}

impl Symbol {
    pub fn new(id: SymbolId, spec: SymbolSpec, quote: SymbolQuote, timestamp: Timestamp) -> Self {
        Self {
            id,
            name: spec.name,
            kind: spec.kind,
            multiplier: spec.multiplier,
            fee_ratio: spec.fee_ratio,
            funding_coefficient: spec.funding_coefficient,
            premium_funding_coefficient: spec.premium_funding_coefficient,
            price: quote.mark,
            spot: quote.spot,
            intrinsic_value: quote.intrinsic_value,
            cumulative_funding_rate: Decimal::ZERO,
            cumulative_premium_funding_rate: Decimal::ZERO,
            traders_net_volume: SignedSize::zero(),
            traders_net_cost: Decimal::ZERO,
            position_holders: 0,
            close_only: false,
            last_update: timestamp,
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self.kind, SymbolKind::Option { .. })
    }

    /// Base value of one unit of volume at the current mark.
    pub fn unit_notional(&self) -> Decimal {
        self.price * self.multiplier
    }

    /// Mark minus intrinsic. what option holders pay premium funding on.
    pub fn premium(&self) -> Decimal {
        self.price - self.intrinsic_value
    }

    pub fn net_notional(&self) -> Decimal {
        (self.traders_net_volume.value() * self.unit_notional()).abs()
    }

    /// Aggregate unrealized pnl of all traders, the pool's mirror-image exposure.
    pub fn traders_unrealized_pnl(&self) -> Decimal {
        self.traders_net_volume.value() * self.unit_notional() - self.traders_net_cost
    }

    pub fn apply_params(&mut self, params: SymbolParams) {
        self.fee_ratio = params.fee_ratio;
        self.funding_coefficient = params.funding_coefficient;
        self.premium_funding_coefficient = params.premium_funding_coefficient;
    }

    /// New prices. `last_update` only moves forward, so an interval is never accrued twice.
    pub fn apply_quote(&mut self, quote: SymbolQuote, timestamp: Timestamp) {
        self.price = quote.mark;
        self.spot = quote.spot;
        self.intrinsic_value = quote.intrinsic_value;
        self.last_update = self.last_update.max(timestamp);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolRegistry {
    symbols: Slab<Symbol>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next registration will receive.
    pub fn next_id(&self) -> SymbolId {
        SymbolId(self.symbols.next_index())
    }

    /// A removed symbol left a slot the next registration will reuse.
    pub fn has_vacancy(&self) -> bool {
        self.symbols.capacity_used() > self.symbols.len()
    }

    pub fn add(&mut self, spec: SymbolSpec, quote: SymbolQuote, timestamp: Timestamp) -> Result<SymbolId, PoolError> {
        spec.validate()?;
        let id = self.next_id();
        let index = self.symbols.insert(Symbol::new(id, spec, quote, timestamp));
        debug_assert_eq!(index, id.0);
        Ok(id)
    }

    pub fn remove(&mut self, id: SymbolId) -> Result<Symbol, PoolError> {
        let symbol = self.get(id)?;
        if symbol.position_holders > 0 || !symbol.traders_net_volume.is_zero() {
            return Err(PoolError::PositionHoldersExist {
                symbol_id: id,
                holders: symbol.position_holders,
            });
        }
        self.symbols.remove(id.0).ok_or(PoolError::InvalidSymbolId(id))
    }

    pub fn get(&self, id: SymbolId) -> Result<&Symbol, PoolError> {
        self.symbols.get(id.0).ok_or(PoolError::InvalidSymbolId(id))
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Result<&mut Symbol, PoolError> {
        self.symbols.get_mut(id.0).ok_or(PoolError::InvalidSymbolId(id))
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.symbols.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().map(|(_, s)| s)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.symbols.iter_mut().map(|(_, s)| s)
    }

    pub fn ids(&self) -> Vec<SymbolId> {
        self.symbols.indices().into_iter().map(SymbolId).collect()
    }

    pub fn total_net_notional(&self) -> Decimal {
        self.iter().map(Symbol::net_notional).sum()
    }

    pub fn traders_unrealized_pnl(&self) -> Decimal {
        self.iter().map(Symbol::traders_unrealized_pnl).sum()
    }
}
