// 7.0 config.rs: pool-wide risk parameters in one place. margins, rewards, fee split.
// 7.1 presets per environment and a validate() pass that Pool::new runs before anything else.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/** 7.2: ratios are fractions (0.1 = 10%). rewards are base-denominated */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParams {
    // base liquidity must stay at least this share of total discounted liquidity
    pub min_b_token0_ratio: Decimal,
    // pool equity over traders' net notional
    pub min_pool_margin_ratio: Decimal,
    // trader margin over notional to open or grow exposure
    pub min_initial_margin_ratio: Decimal,
    // below this trader margin over notional the account is liquidatable
    pub min_maintenance_margin_ratio: Decimal,
    pub min_liquidation_reward: Decimal,
    pub max_liquidation_reward: Decimal,
    // fraction of closed notional paid to the liquidator before clamping
    pub liquidation_cut_ratio: Decimal,
    // share of each trading fee kept by the protocol, the rest is LP pnl
    pub protocol_fee_collect_ratio: Decimal,
    // funding coefficients are quoted per this many seconds
    pub funding_period_secs: u64,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            min_b_token0_ratio: dec!(0.2),
            min_pool_margin_ratio: dec!(1),
            min_initial_margin_ratio: dec!(0.1),
            min_maintenance_margin_ratio: dec!(0.05),
            min_liquidation_reward: dec!(10),
            max_liquidation_reward: dec!(1000),
            liquidation_cut_ratio: dec!(0.5),
            protocol_fee_collect_ratio: dec!(1),
            funding_period_secs: 86_400,
        }
    }
}

impl PoolParams {
    // Testnet: LPs keep most of the fee, looser pool margin so small pools can trade
    pub fn testnet() -> Self {
        Self {
            min_pool_margin_ratio: dec!(0.5),
            protocol_fee_collect_ratio: dec!(0.2),
            max_liquidation_reward: dec!(200),
            ..Self::default()
        }
    }

    // Mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        Self {
            min_b_token0_ratio: dec!(0.3),
            min_initial_margin_ratio: dec!(0.2),
            min_maintenance_margin_ratio: dec!(0.1),
            protocol_fee_collect_ratio: dec!(0.2),
            ..Self::default()
        }
    }

    pub fn funding_period(&self) -> Decimal {
        Decimal::from(self.funding_period_secs)
    }

    // Validate the parameters for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !in_unit_interval(self.min_b_token0_ratio) {
            return Err(ConfigError::InvalidRatio {
                name: "min_b_token0_ratio",
                value: self.min_b_token0_ratio,
            });
        }

        if self.min_pool_margin_ratio < Decimal::ZERO {
            return Err(ConfigError::InvalidRatio {
                name: "min_pool_margin_ratio",
                value: self.min_pool_margin_ratio,
            });
        }

        // maintenance must sit strictly below initial or accounts open straight into liquidation
        if self.min_maintenance_margin_ratio <= Decimal::ZERO
            || self.min_maintenance_margin_ratio >= self.min_initial_margin_ratio
        {
            return Err(ConfigError::InvalidMargin {
                reason: "maintenance ratio must be positive and below the initial ratio".to_string(),
            });
        }

        if self.min_initial_margin_ratio > Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "initial ratio above 1 disables leverage entirely".to_string(),
            });
        }

        if self.min_liquidation_reward < Decimal::ZERO
            || self.min_liquidation_reward > self.max_liquidation_reward
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "liquidation reward bounds must satisfy 0 <= min <= max".to_string(),
            });
        }

        if !in_unit_interval(self.liquidation_cut_ratio) {
            return Err(ConfigError::InvalidRatio {
                name: "liquidation_cut_ratio",
                value: self.liquidation_cut_ratio,
            });
        }

        if !in_unit_interval(self.protocol_fee_collect_ratio) {
            return Err(ConfigError::InvalidRatio {
                name: "protocol_fee_collect_ratio",
                value: self.protocol_fee_collect_ratio,
            });
        }

        if self.funding_period_secs == 0 {
            return Err(ConfigError::InvalidFunding {
                reason: "funding period must be at least one second".to_string(),
            });
        }

        Ok(())
    }
}

fn in_unit_interval(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} = {value} is outside its allowed range")]
    InvalidRatio { name: &'static str, value: Decimal },

    #[error("invalid margin parameters: {reason}")]
    InvalidMargin { reason: String },

    #[error("invalid liquidation parameters: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("invalid funding parameters: {reason}")]
    InvalidFunding { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn params(&self) -> PoolParams {
        match self {
            Environment::Development => PoolParams::default(),
            Environment::Testnet => PoolParams::testnet(),
            Environment::Mainnet => PoolParams::mainnet_conservative(),
        }
    }
}
