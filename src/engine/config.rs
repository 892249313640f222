//! Pool construction options.

use crate::config::PoolParams;
use crate::types::{AccountId, PoolId};
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Log every event at info instead of debug.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
        }
    }
}

/// Identity, authority and parameters of one pool instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: PoolId,
    /// The only account allowed to run admin and migration operations.
    pub controller: AccountId,
    /// Receives collected protocol fees.
    pub protocol_fee_collector: AccountId,
    pub params: PoolParams,
    pub engine: EngineConfig,
}

impl PoolConfig {
    pub fn new(id: PoolId, controller: AccountId) -> Self {
        Self {
            id,
            controller,
            protocol_fee_collector: controller,
            params: PoolParams::default(),
            engine: EngineConfig::default(),
        }
    }

    pub fn with_params(mut self, params: PoolParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_fee_collector(mut self, collector: AccountId) -> Self {
        self.protocol_fee_collector = collector;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_defaults_to_controller() {
        let config = PoolConfig::new(PoolId(1), AccountId(100));
        assert_eq!(config.protocol_fee_collector, AccountId(100));

        let config = config.with_fee_collector(AccountId(7)).with_engine(EngineConfig {
            max_events: 10,
            verbose: true,
        });
        assert_eq!(config.protocol_fee_collector, AccountId(7));
        assert_eq!(config.controller, AccountId(100));
        assert_eq!(config.engine.max_events, 10);
    }

    #[test]
    fn pool_config_serde() {
        let config = PoolConfig::new(PoolId(3), AccountId(1)).with_params(PoolParams::testnet());
        let json = serde_json::to_string(&config).unwrap();
        let back: PoolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, PoolId(3));
        assert_eq!(back.params, PoolParams::testnet());
    }
}
