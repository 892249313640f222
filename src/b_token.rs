//! Collateral buckets (bTokens) and pool pnl attribution.
//!
//! Each bToken is an independent liquidity/pnl accounting unit. Pool-side gains and
//! losses are split across bTokens in proportion to their discounted liquidity value
//! and recorded in a per-share accumulator, so liquidity providers are settled lazily
//! without iterating over them.

use crate::engine::PoolError;
use crate::registry::Slab;
use crate::types::BTokenId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Registration parameters for a new bToken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTokenSpec {
    pub name: String,
    pub decimals: u32,
    // haircut applied when valuing this collateral, 1 = full value
    pub discount: Decimal,
}

impl BTokenSpec {
    pub fn new(name: impl Into<String>, decimals: u32, discount: Decimal) -> Self {
        Self {
            name: name.into(),
            decimals,
            discount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BToken {
    pub id: BTokenId,
    pub name: String,
    pub decimals: u32,
    pub discount: Decimal,
    // base value of one unit, from the last quote. always 1 for the base token
    pub price: Decimal,
    // total LP shares outstanding, one share per unit of principal
    pub liquidity: Decimal,
    // base-denominated pnl credited to this bucket and not yet paid out
    pub pnl: Decimal,
    pub cumulative_pnl_per_share: Decimal,
}

impl BToken {
    pub fn new(id: BTokenId, spec: BTokenSpec) -> Self {
        Self {
            id,
            name: spec.name,
            decimals: spec.decimals,
            discount: spec.discount,
            price: Decimal::ONE,
            liquidity: Decimal::ZERO,
            pnl: Decimal::ZERO,
            cumulative_pnl_per_share: Decimal::ZERO,
        }
    }

    /// Discounted base value of `amount` units.
    pub fn collateral_value(&self, amount: Decimal) -> Decimal {
        amount * self.price * self.discount
    }

    pub fn liquidity_value(&self) -> Decimal {
        self.collateral_value(self.liquidity)
    }

    fn credit_pnl(&mut self, amount: Decimal) {
        self.pnl += amount;
        if self.liquidity > Decimal::ZERO {
            self.cumulative_pnl_per_share += amount / self.liquidity;
        }
    }
}

pub(crate) fn validate_discount(discount: Decimal) -> Result<(), PoolError> {
    if discount <= Decimal::ZERO || discount > Decimal::ONE {
        return Err(PoolError::InvalidAmount {
            what: "discount",
            value: discount,
        });
    }
    Ok(())
}

/// All registered bTokens. slot 0 is the base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BTokenPool {
    tokens: Slab<BToken>,
}

impl BTokenPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: BTokenSpec) -> Result<BTokenId, PoolError> {
        validate_discount(spec.discount)?;
        let id = BTokenId(self.tokens.next_index());
        // the first bucket is the unit everything else is valued in
        if id.is_base() && spec.discount != Decimal::ONE {
            return Err(PoolError::InvalidAmount {
                what: "base discount",
                value: spec.discount,
            });
        }
        let index = self.tokens.insert(BToken::new(id, spec));
        debug_assert_eq!(index, id.0);
        Ok(id)
    }

    pub fn get(&self, id: BTokenId) -> Result<&BToken, PoolError> {
        self.tokens.get(id.0).ok_or(PoolError::InvalidBTokenId(id))
    }

    pub fn get_mut(&mut self, id: BTokenId) -> Result<&mut BToken, PoolError> {
        self.tokens.get_mut(id.0).ok_or(PoolError::InvalidBTokenId(id))
    }

    pub fn contains(&self, id: BTokenId) -> bool {
        self.tokens.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BToken> {
        self.tokens.iter().map(|(_, t)| t)
    }

    pub fn ids(&self) -> Vec<BTokenId> {
        self.tokens.indices().into_iter().map(BTokenId).collect()
    }

    pub fn total_liquidity_value(&self) -> Decimal {
        self.iter().map(BToken::liquidity_value).sum()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.iter().map(|t| t.pnl).sum()
    }

    /// Base liquidity over total discounted liquidity. None while the pool is empty.
    pub fn base_ratio(&self) -> Option<Decimal> {
        let total = self.total_liquidity_value();
        if total <= Decimal::ZERO {
            return None;
        }
        let base = self
            .tokens
            .get(BTokenId::BASE.0)
            .map_or(Decimal::ZERO, BToken::liquidity_value);
        Some(base / total)
    }

    /// Splits `amount` across buckets by discounted liquidity value. The last bucket
    /// takes the rounding remainder so the shares always sum to `amount`. Returns the
    /// shares, or None when no bucket holds liquidity.
    pub fn distribute_pnl(&mut self, amount: Decimal) -> Option<Vec<(BTokenId, Decimal)>> {
        let total = self.total_liquidity_value();
        if total <= Decimal::ZERO {
            return None;
        }

        let weights: Vec<(u32, Decimal)> = self
            .tokens
            .iter()
            .filter(|(_, t)| t.liquidity_value() > Decimal::ZERO)
            .map(|(i, t)| (i, t.liquidity_value()))
            .collect();

        let mut shares = Vec::with_capacity(weights.len());
        let mut remaining = amount;
        let last = weights.len().saturating_sub(1);

        for (n, (index, weight)) in weights.into_iter().enumerate() {
            let share = if n == last {
                remaining
            } else {
                amount * weight / total
            };
            remaining -= share;
            if let Some(token) = self.tokens.get_mut(index) {
                token.credit_pnl(share);
            }
            shares.push((BTokenId(index), share));
        }

        Some(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pool_with_weth() -> BTokenPool {
        let mut pool = BTokenPool::new();
        pool.add(BTokenSpec::new("USDT", 6, dec!(1))).unwrap();
        let weth = pool.add(BTokenSpec::new("WETH", 18, dec!(0.8))).unwrap();
        pool.get_mut(weth).unwrap().price = dec!(2000);
        pool
    }

    #[test]
    fn base_must_be_undiscounted() {
        let mut pool = BTokenPool::new();
        let err = pool.add(BTokenSpec::new("WETH", 18, dec!(0.8))).unwrap_err();
        assert!(matches!(err, PoolError::InvalidAmount { what: "base discount", .. }));
        assert!(pool.is_empty());
    }

    #[test]
    fn discount_bounds() {
        let mut pool = BTokenPool::new();
        pool.add(BTokenSpec::new("USDT", 6, dec!(1))).unwrap();
        assert!(pool.add(BTokenSpec::new("X", 18, dec!(0))).is_err());
        assert!(pool.add(BTokenSpec::new("X", 18, dec!(1.01))).is_err());
        assert_eq!(pool.add(BTokenSpec::new("SUSHI", 18, dec!(0.5))).unwrap(), BTokenId(1));
    }

    #[test]
    fn unknown_btoken() {
        let pool = pool_with_weth();
        assert_eq!(pool.get(BTokenId(5)).unwrap_err(), PoolError::InvalidBTokenId(BTokenId(5)));
    }

    #[test]
    fn liquidity_value_is_discounted() {
        let mut pool = pool_with_weth();
        pool.get_mut(BTokenId(0)).unwrap().liquidity = dec!(10000);
        pool.get_mut(BTokenId(1)).unwrap().liquidity = dec!(20);

        // 20 WETH * 2000 * 0.8
        assert_eq!(pool.get(BTokenId(1)).unwrap().liquidity_value(), dec!(32000));
        assert_eq!(pool.total_liquidity_value(), dec!(42000));
        assert_eq!(pool.base_ratio().unwrap(), dec!(10000) / dec!(42000));
    }

    #[test]
    fn distribution_follows_weight() {
        let mut pool = pool_with_weth();
        pool.get_mut(BTokenId(0)).unwrap().liquidity = dec!(10000);
        pool.get_mut(BTokenId(1)).unwrap().liquidity = dec!(20);

        let shares = pool.distribute_pnl(dec!(0.042)).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0], (BTokenId(0), dec!(0.01)));
        assert_eq!(shares[1], (BTokenId(1), dec!(0.032)));

        let base = pool.get(BTokenId(0)).unwrap();
        assert_eq!(base.pnl, dec!(0.01));
        assert_eq!(base.cumulative_pnl_per_share, dec!(0.000001));
        assert_eq!(pool.get(BTokenId(1)).unwrap().cumulative_pnl_per_share, dec!(0.0016));
    }

    #[test]
    fn distribution_sums_exactly() {
        let mut pool = pool_with_weth();
        pool.get_mut(BTokenId(0)).unwrap().liquidity = dec!(3);
        pool.get_mut(BTokenId(1)).unwrap().liquidity = dec!(0.0007);

        let shares = pool.distribute_pnl(dec!(1)).unwrap();
        let sum: Decimal = shares.iter().map(|(_, s)| *s).sum();
        assert_eq!(sum, dec!(1));
        assert_eq!(pool.total_pnl(), dec!(1));
    }

    #[test]
    fn empty_pool_distributes_nothing() {
        let mut pool = pool_with_weth();
        assert!(pool.distribute_pnl(dec!(5)).is_none());
        assert_eq!(pool.total_pnl(), Decimal::ZERO);
        assert!(pool.base_ratio().is_none());
    }
}
