// shared pool fixture for the engine unit tests: USDT base, SUSHI at 2 with a 0.5
// discount, BTCUSD at 60000 and 10000 USDT of liquidity.

use super::config::PoolConfig;
use super::core::Pool;
use crate::b_token::BTokenSpec;
use crate::collaborators::{
    Collaborators, FixedRateSwapper, LinearVolatilityPricer, StaticPriceOracle, StaticVolatilityOracle,
};
use crate::config::PoolParams;
use crate::symbol::SymbolSpec;
use crate::types::{AccountId, BTokenId, PoolId, Price, SymbolId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub(crate) const CONTROLLER: AccountId = AccountId(100);
pub(crate) const LP: AccountId = AccountId(1);
pub(crate) const TRADER: AccountId = AccountId(2);
pub(crate) const LIQUIDATOR: AccountId = AccountId(3);

pub(crate) const USDT: BTokenId = BTokenId(0);
pub(crate) const SUSHI: BTokenId = BTokenId(1);
pub(crate) const BTCUSD: SymbolId = SymbolId(0);

pub(crate) struct Fixture {
    pub pool: Pool,
    pub prices: Arc<StaticPriceOracle>,
    pub vols: Arc<StaticVolatilityOracle>,
    pub swapper: Arc<FixedRateSwapper>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_params(PoolParams::default())
    }

    pub fn with_params(params: PoolParams) -> Self {
        let prices = Arc::new(StaticPriceOracle::new());
        let vols = Arc::new(StaticVolatilityOracle::new());
        let swapper = Arc::new(FixedRateSwapper::new());
        swapper.set_rate(SUSHI, dec!(2));

        let collaborators = Collaborators::new(prices.clone())
            .with_volatility_oracle(vols.clone())
            .with_option_pricer(Arc::new(LinearVolatilityPricer::new(dec!(0.05))))
            .with_swapper(swapper.clone());

        let config = PoolConfig::new(PoolId(1), CONTROLLER).with_params(params);
        let mut pool = Pool::new(config, collaborators).unwrap();

        pool.add_b_token(CONTROLLER, BTokenSpec::new("USDT", 6, dec!(1))).unwrap();
        pool.add_b_token(CONTROLLER, BTokenSpec::new("SUSHI", 18, dec!(0.5))).unwrap();

        prices.set_price(BTCUSD, Price::new_unchecked(dec!(60000)));
        pool.add_symbol(
            CONTROLLER,
            SymbolSpec::futures("BTCUSD", dec!(0.0001), dec!(0.0001), dec!(0.00001)),
        )
        .unwrap();

        pool.add_liquidity(LP, USDT, dec!(10000)).unwrap();

        Self {
            pool,
            prices,
            vols,
            swapper,
        }
    }

    pub fn set_price(&self, symbol_id: SymbolId, price: Decimal) {
        self.prices.set_price(symbol_id, Price::new_unchecked(price));
    }

    pub fn fund_trader_base(&mut self, amount: Decimal) {
        self.pool.add_margin(TRADER, USDT, amount).unwrap();
    }
}
