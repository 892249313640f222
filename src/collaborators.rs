// 9.0 collaborators.rs: everything the pool reads from outside its own ledger.
//
// The pool is agnostic to where prices, volatilities and conversion rates come from.
// It only ever reads these during the quote phase of an operation, before any ledger
// mutation, so an implementation is free to fail: the whole operation is discarded.
// The Static*/Fixed*/AllowList* types are in-memory sources for tests and dry runs.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::types::{AccountId, BTokenId, Price, SymbolId};

/// Errors surfaced by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("no price available for {0}")]
    PriceUnavailable(SymbolId),

    #[error("no volatility available for {0}")]
    VolatilityUnavailable(SymbolId),

    #[error("cannot convert {0} to base")]
    ConversionUnavailable(BTokenId),

    #[error("option pricing failed: {reason}")]
    PricingFailed { reason: String },

    #[error("{0} collaborator is not configured")]
    NotConfigured(&'static str),
}

/// Spot price of a symbol's underlying, in base collateral.
pub trait PriceOracle: Send + Sync {
    fn get_price(&self, symbol_id: SymbolId) -> Result<Price, CollaboratorError>;
}

/// Annualised volatility of a symbol's underlying (0.8 = 80%).
pub trait VolatilityOracle: Send + Sync {
    fn get_volatility(&self, symbol_id: SymbolId) -> Result<Decimal, CollaboratorError>;
}

/// Quote for swapping an amount of non-base collateral into base collateral.
pub trait CollateralSwapper: Send + Sync {
    fn convert_to_base(&self, b_token_id: BTokenId, amount: Decimal) -> Result<Decimal, CollaboratorError>;
}

/// Gate on who may liquidate.
pub trait LiquidatorQualifier: Send + Sync {
    fn is_qualified(&self, account: AccountId) -> bool;
}

/// Time value of an option. intrinsic value is computed by the pool itself.
pub trait OptionPricer: Send + Sync {
    fn time_value(
        &self,
        spot: Price,
        strike: Decimal,
        volatility: Decimal,
        is_call: bool,
    ) -> Result<Decimal, CollaboratorError>;
}

/// The set of collaborators a pool reads from. Only the price oracle is mandatory.
#[derive(Clone)]
pub struct Collaborators {
    pub price_oracle: Arc<dyn PriceOracle>,
    pub volatility_oracle: Option<Arc<dyn VolatilityOracle>>,
    pub option_pricer: Option<Arc<dyn OptionPricer>>,
    pub swapper: Option<Arc<dyn CollateralSwapper>>,
    pub liquidator_qualifier: Option<Arc<dyn LiquidatorQualifier>>,
}

impl Collaborators {
    pub fn new(price_oracle: Arc<dyn PriceOracle>) -> Self {
        Self {
            price_oracle,
            volatility_oracle: None,
            option_pricer: None,
            swapper: None,
            liquidator_qualifier: None,
        }
    }

    pub fn with_volatility_oracle(mut self, oracle: Arc<dyn VolatilityOracle>) -> Self {
        self.volatility_oracle = Some(oracle);
        self
    }

    pub fn with_option_pricer(mut self, pricer: Arc<dyn OptionPricer>) -> Self {
        self.option_pricer = Some(pricer);
        self
    }

    pub fn with_swapper(mut self, swapper: Arc<dyn CollateralSwapper>) -> Self {
        self.swapper = Some(swapper);
        self
    }

    pub fn with_liquidator_qualifier(mut self, qualifier: Arc<dyn LiquidatorQualifier>) -> Self {
        self.liquidator_qualifier = Some(qualifier);
        self
    }

    /// Base value of one unit of `b_token_id`.
    pub fn unit_rate(&self, b_token_id: BTokenId) -> Result<Decimal, CollaboratorError> {
        if b_token_id.is_base() {
            return Ok(Decimal::ONE);
        }
        let swapper = self
            .swapper
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("collateral swapper"))?;
        swapper.convert_to_base(b_token_id, Decimal::ONE)
    }

    pub fn volatility(&self, symbol_id: SymbolId) -> Result<Decimal, CollaboratorError> {
        let oracle = self
            .volatility_oracle
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("volatility oracle"))?;
        oracle.get_volatility(symbol_id)
    }

    pub fn time_value(
        &self,
        spot: Price,
        strike: Decimal,
        volatility: Decimal,
        is_call: bool,
    ) -> Result<Decimal, CollaboratorError> {
        let pricer = self
            .option_pricer
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("option pricer"))?;
        pricer.time_value(spot, strike, volatility, is_call)
    }

    /// Unset qualifier means anyone may liquidate.
    pub fn may_liquidate(&self, account: AccountId) -> bool {
        self.liquidator_qualifier
            .as_ref()
            .map_or(true, |q| q.is_qualified(account))
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("volatility_oracle", &self.volatility_oracle.is_some())
            .field("option_pricer", &self.option_pricer.is_some())
            .field("swapper", &self.swapper.is_some())
            .field("liquidator_qualifier", &self.liquidator_qualifier.is_some())
            .finish_non_exhaustive()
    }
}

// 9.1: in-memory sources. interior mutability so a test can move prices while the pool holds an Arc.

#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: RwLock<BTreeMap<SymbolId, Price>>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol_id: SymbolId, price: Price) {
        self.prices.write().insert(symbol_id, price);
    }

    pub fn clear_price(&self, symbol_id: SymbolId) {
        self.prices.write().remove(&symbol_id);
    }
}

impl PriceOracle for StaticPriceOracle {
    fn get_price(&self, symbol_id: SymbolId) -> Result<Price, CollaboratorError> {
        self.prices
            .read()
            .get(&symbol_id)
            .copied()
            .ok_or(CollaboratorError::PriceUnavailable(symbol_id))
    }
}

#[derive(Debug, Default)]
pub struct StaticVolatilityOracle {
    volatilities: RwLock<BTreeMap<SymbolId, Decimal>>,
}

impl StaticVolatilityOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_volatility(&self, symbol_id: SymbolId, volatility: Decimal) {
        self.volatilities.write().insert(symbol_id, volatility);
    }
}

impl VolatilityOracle for StaticVolatilityOracle {
    fn get_volatility(&self, symbol_id: SymbolId) -> Result<Decimal, CollaboratorError> {
        self.volatilities
            .read()
            .get(&symbol_id)
            .copied()
            .ok_or(CollaboratorError::VolatilityUnavailable(symbol_id))
    }
}

/// Linear conversion at a fixed per-unit rate, no slippage.
#[derive(Debug, Default)]
pub struct FixedRateSwapper {
    rates: RwLock<BTreeMap<BTokenId, Decimal>>,
}

impl FixedRateSwapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, b_token_id: BTokenId, rate: Decimal) {
        self.rates.write().insert(b_token_id, rate);
    }
}

impl CollateralSwapper for FixedRateSwapper {
    fn convert_to_base(&self, b_token_id: BTokenId, amount: Decimal) -> Result<Decimal, CollaboratorError> {
        if b_token_id.is_base() {
            return Ok(amount);
        }
        let rate = self
            .rates
            .read()
            .get(&b_token_id)
            .copied()
            .ok_or(CollaboratorError::ConversionUnavailable(b_token_id))?;
        Ok(amount * rate)
    }
}

#[derive(Debug, Default)]
pub struct AllowListQualifier {
    allowed: RwLock<BTreeSet<AccountId>>,
}

impl AllowListQualifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, account: AccountId) {
        self.allowed.write().insert(account);
    }

    pub fn revoke(&self, account: AccountId) {
        self.allowed.write().remove(&account);
    }
}

impl LiquidatorQualifier for AllowListQualifier {
    fn is_qualified(&self, account: AccountId) -> bool {
        self.allowed.read().contains(&account)
    }
}

/// Time value proportional to volatility and spot: `factor * volatility * spot`.
/// A stand-in for a real model, monotone in volatility and never negative.
#[derive(Debug, Clone)]
pub struct LinearVolatilityPricer {
    pub factor: Decimal,
}

impl LinearVolatilityPricer {
    pub fn new(factor: Decimal) -> Self {
        Self { factor }
    }
}

impl OptionPricer for LinearVolatilityPricer {
    fn time_value(
        &self,
        spot: Price,
        _strike: Decimal,
        volatility: Decimal,
        _is_call: bool,
    ) -> Result<Decimal, CollaboratorError> {
        if volatility < Decimal::ZERO {
            return Err(CollaboratorError::PricingFailed {
                reason: format!("negative volatility {volatility}"),
            });
        }
        Ok(self.factor * volatility * spot.value())
    }
}
