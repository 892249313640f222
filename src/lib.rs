// perps-settlement: multi-collateral perpetual settlement engine.
// the pool is the counterparty to every trade; LPs own its pnl, per bToken.
// all computation is deterministic. prices and rates come in through Collaborators only.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: PoolId, AccountId, SymbolId, BTokenId, SignedSize, Price
//   2.0  registry.rs: slab arena with free-list, backs bTokens and symbols
//   3.x  margin.rs: initial/maintenance requirement, pool margin
//   4.x  position.rs: position struct, fill math, realized cost
//   5.x  funding.rs: disequilibrium and option premium funding
//   6.x  liquidation.rs: liquidation condition, liquidator reward
//   7.x  config.rs: pool params, env presets, validation
//   8.x  engine/: Pool, staging, quote phase, every public operation
//   9.0  collaborators.rs: oracle, volatility, pricer, swapper, qualifier seams
//   9.2  custody.rs: vault balances per bToken
//   9.3  lp.rs: LP shares and lazy pnl settlement
//   10.x account.rs: margin accounts and account metrics
//   11.x events.rs: state transition events for audit
//   12.x symbol.rs: symbol config + runtime state, symbol registry
//   13.x b_token.rs: bToken pool, pnl attribution by liquidity value
//   14.x migration.rs: timelocked migration state machine, conservation check

// ledger modules
pub mod account;
pub mod b_token;
pub mod engine;
pub mod events;
pub mod funding;
pub mod liquidation;
pub mod lp;
pub mod margin;
pub mod position;
pub mod registry;
pub mod symbol;
pub mod types;

// integration modules
pub mod collaborators;
pub mod config;
pub mod custody;
pub mod migration;

// re exports for convenience
pub use account::*;
pub use b_token::*;
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use liquidation::*;
pub use lp::*;
pub use margin::*;
pub use position::*;
pub use symbol::*;
pub use types::*;
pub use collaborators::{
    AllowListQualifier, CollaboratorError, Collaborators, CollateralSwapper, FixedRateSwapper, LinearVolatilityPricer,
    LiquidatorQualifier, OptionPricer, PriceOracle, StaticPriceOracle, StaticVolatilityOracle, VolatilityOracle,
};
pub use config::{ConfigError, Environment, PoolParams};
pub use custody::Vault;
pub use migration::{verify_conservation, CollateralSnapshot, MigrationState};
pub use registry::Slab;
