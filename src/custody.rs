// 9.2 custody.rs: collateral physically held by the pool, per bToken.
// every transfer in or out of the pool moves a vault balance. conversions of non-base
// collateral happen at the rate quoted before the operation started.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::PoolError;
use crate::types::BTokenId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    balances: BTreeMap<BTokenId, Decimal>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, b_token_id: BTokenId) -> Decimal {
        self.balances.get(&b_token_id).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn deposit(&mut self, b_token_id: BTokenId, amount: Decimal) {
        *self.balances.entry(b_token_id).or_insert(Decimal::ZERO) += amount;
    }

    pub fn withdraw(&mut self, b_token_id: BTokenId, amount: Decimal) -> Result<(), PoolError> {
        let available = self.balance(b_token_id);
        if amount > available {
            return Err(PoolError::VaultShortfall {
                b_token_id,
                requested: amount,
                available,
            });
        }
        self.balances.insert(b_token_id, available - amount);
        Ok(())
    }

    /// Swaps `amount` of `b_token_id` into `base_amount` of base collateral.
    pub fn convert_to_base(&mut self, b_token_id: BTokenId, amount: Decimal, base_amount: Decimal) -> Result<(), PoolError> {
        self.withdraw(b_token_id, amount)?;
        self.deposit(BTokenId::BASE, base_amount);
        Ok(())
    }

    pub fn balances(&self) -> &BTreeMap<BTokenId, Decimal> {
        &self.balances
    }

    /// Moves every balance into `other`, leaving this vault empty.
    pub fn drain_into(&mut self, other: &mut Vault) {
        for (b_token_id, amount) in std::mem::take(&mut self.balances) {
            other.deposit(b_token_id, amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.balances.values().all(Decimal::is_zero)
    }
}
