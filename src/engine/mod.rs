// 8.0: settlement engine. one Pool owns the bToken pool, symbol registry, LP and
// margin ledgers, and the vault. every public operation either commits completely
// or leaves the pool untouched.
// deterministic and event-driven; the only outside calls go through Collaborators
// during the quote phase, before anything is staged.

mod admin;
mod config;
mod core;
mod liquidations;
mod liquidity;
mod margins;
mod migrations;
mod pricing;
mod results;
mod state;
mod trades;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, PoolConfig};
pub use core::Pool;
pub use pricing::{quote_symbol, OracleQuotes};
pub use results::{
    ErrorClass, LiquidationResult, LiquidityResult, MarginResult, MigrationResult, PoolError, TradeResult,
};
pub use state::{PoolState, ProtocolFeeAccrual};
