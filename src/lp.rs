// 9.3 lp.rs: liquidity-provider shares per (account, bToken).
// a position realizes pnl lazily: shares * (accumulator now - accumulator at last touch).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AccountId, BTokenId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpPosition {
    pub owner: AccountId,
    pub b_token_id: BTokenId,
    pub shares: Decimal,
    pub last_cumulative_pnl_per_share: Decimal,
    // realized from the accumulator, not yet paid out. base-denominated
    pub pnl: Decimal,
}

impl LpPosition {
    pub fn new(owner: AccountId, b_token_id: BTokenId, cumulative_pnl_per_share: Decimal) -> Self {
        Self {
            owner,
            b_token_id,
            shares: Decimal::ZERO,
            last_cumulative_pnl_per_share: cumulative_pnl_per_share,
            pnl: Decimal::ZERO,
        }
    }

    pub fn pending_pnl(&self, cumulative_pnl_per_share: Decimal) -> Decimal {
        self.shares * (cumulative_pnl_per_share - self.last_cumulative_pnl_per_share)
    }

    /// Folds pending pnl into `pnl` and advances the snapshot. Returns the amount folded.
    pub fn settle(&mut self, cumulative_pnl_per_share: Decimal) -> Decimal {
        let delta = self.pending_pnl(cumulative_pnl_per_share);
        self.pnl += delta;
        self.last_cumulative_pnl_per_share = cumulative_pnl_per_share;
        delta
    }

    /// Pro-rata slice of realized pnl that leaves with `shares`.
    pub fn pnl_for(&self, shares: Decimal) -> Decimal {
        if self.shares.is_zero() || shares >= self.shares {
            return self.pnl;
        }
        self.pnl * shares / self.shares
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_zero() && self.pnl.is_zero()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LpLedger {
    positions: BTreeMap<AccountId, BTreeMap<BTokenId, LpPosition>>,
}

impl LpLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: AccountId, b_token_id: BTokenId) -> Option<&LpPosition> {
        self.positions.get(&owner)?.get(&b_token_id)
    }

    pub fn get_mut(&mut self, owner: AccountId, b_token_id: BTokenId) -> Option<&mut LpPosition> {
        self.positions.get_mut(&owner)?.get_mut(&b_token_id)
    }

    /// Existing position, or a fresh one snapshotted at `cumulative_pnl_per_share`.
    pub fn entry(
        &mut self,
        owner: AccountId,
        b_token_id: BTokenId,
        cumulative_pnl_per_share: Decimal,
    ) -> &mut LpPosition {
        self.positions
            .entry(owner)
            .or_default()
            .entry(b_token_id)
            .or_insert_with(|| LpPosition::new(owner, b_token_id, cumulative_pnl_per_share))
    }

    pub fn remove_if_empty(&mut self, owner: AccountId, b_token_id: BTokenId) {
        if let Some(by_token) = self.positions.get_mut(&owner) {
            if by_token.get(&b_token_id).is_some_and(LpPosition::is_empty) {
                by_token.remove(&b_token_id);
            }
            if by_token.is_empty() {
                self.positions.remove(&owner);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LpPosition> {
        self.positions.values().flat_map(|by_token| by_token.values())
    }

    pub fn total_shares(&self, b_token_id: BTokenId) -> Decimal {
        self.iter()
            .filter(|p| p.b_token_id == b_token_id)
            .map(|p| p.shares)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
