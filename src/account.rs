//! Trader margin accounts.
//!
//! Accounts are cross-margined: one pool of collateral, held in per-bToken buckets,
//! backs every open position. The base bucket is signed; it absorbs fees, realized
//! pnl and funding. Non-base buckets only ever hold non-negative collateral and are
//! valued at their quoted price times the bToken discount.

use crate::b_token::BTokenPool;
use crate::config::PoolParams;
use crate::margin::{calculate_margin_requirement, margin_ratio};
use crate::position::Position;
use crate::symbol::SymbolRegistry;
use crate::types::{AccountId, BTokenId, SymbolId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginAccount {
    pub owner: AccountId,
    pub margins: BTreeMap<BTokenId, Decimal>,
    pub positions: BTreeMap<SymbolId, Position>,
    pub active_symbol_ids: BTreeSet<SymbolId>,
}

impl MarginAccount {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            margins: BTreeMap::new(),
            positions: BTreeMap::new(),
            active_symbol_ids: BTreeSet::new(),
        }
    }

    pub fn margin(&self, b_token_id: BTokenId) -> Decimal {
        self.margins.get(&b_token_id).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn credit(&mut self, b_token_id: BTokenId, amount: Decimal) {
        *self.margins.entry(b_token_id).or_insert(Decimal::ZERO) += amount;
    }

    pub fn debit(&mut self, b_token_id: BTokenId, amount: Decimal) {
        self.credit(b_token_id, -amount);
    }

    pub fn get_position(&self, symbol_id: SymbolId) -> Option<&Position> {
        self.positions.get(&symbol_id)
    }

    /// Stores `position`, or drops it and leaves the active set when flat.
    pub fn set_position(&mut self, position: Position) {
        let symbol_id = position.symbol_id;
        if position.is_empty() {
            self.positions.remove(&symbol_id);
            self.active_symbol_ids.remove(&symbol_id);
        } else {
            self.active_symbol_ids.insert(symbol_id);
            self.positions.insert(symbol_id, position);
        }
    }

    pub fn has_positions(&self) -> bool {
        !self.active_symbol_ids.is_empty()
    }

    /// Collateral buckets with a nonzero balance, non-base ones only.
    pub fn non_base_collateral(&self) -> Vec<(BTokenId, Decimal)> {
        self.margins
            .iter()
            .filter(|(id, amount)| !id.is_base() && !amount.is_zero())
            .map(|(id, amount)| (*id, *amount))
            .collect()
    }

    /// No collateral, no positions.
    pub fn is_empty(&self) -> bool {
        self.active_symbol_ids.is_empty() && self.margins.values().all(Decimal::is_zero)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginLedger {
    accounts: BTreeMap<AccountId, MarginAccount>,
}

impl MarginLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: AccountId) -> Option<&MarginAccount> {
        self.accounts.get(&owner)
    }

    pub fn get_mut(&mut self, owner: AccountId) -> Option<&mut MarginAccount> {
        self.accounts.get_mut(&owner)
    }

    pub fn entry(&mut self, owner: AccountId) -> &mut MarginAccount {
        self.accounts
            .entry(owner)
            .or_insert_with(|| MarginAccount::new(owner))
    }

    pub fn remove(&mut self, owner: AccountId) -> Option<MarginAccount> {
        self.accounts.remove(&owner)
    }

    pub fn remove_if_empty(&mut self, owner: AccountId) {
        if self.accounts.get(&owner).is_some_and(MarginAccount::is_empty) {
            self.accounts.remove(&owner);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarginAccount> {
        self.accounts.values()
    }

    pub fn owners(&self) -> Vec<AccountId> {
        self.accounts.keys().copied().collect()
    }

    pub fn total_margin(&self, b_token_id: BTokenId) -> Decimal {
        self.iter().map(|a| a.margin(b_token_id)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountMetrics {
    // discounted value of every bucket, base-denominated
    pub collateral_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub pending_funding: Decimal,
    // collateral + unrealized - pending funding
    pub equity: Decimal,
    pub notional: Decimal,
    pub initial_required: Decimal,
    pub maintenance_required: Decimal,
    pub margin_ratio: Option<Decimal>,
}

impl AccountMetrics {
    pub fn meets_initial(&self) -> bool {
        self.equity >= self.initial_required
    }

    pub fn meets_maintenance(&self) -> bool {
        self.equity >= self.maintenance_required
    }
}

/// Values an account at the symbols' and bTokens' last refreshed prices.
/// Buckets of unknown bTokens and positions in unknown symbols count as zero.
pub fn calculate_account_metrics(
    account: &MarginAccount,
    b_tokens: &BTokenPool,
    symbols: &SymbolRegistry,
    params: &PoolParams,
) -> AccountMetrics {
    let collateral_value: Decimal = account
        .margins
        .iter()
        .map(|(id, amount)| b_tokens.get(*id).map_or(Decimal::ZERO, |t| t.collateral_value(*amount)))
        .sum();

    let mut unrealized_pnl = Decimal::ZERO;
    let mut pending_funding = Decimal::ZERO;
    let mut notional = Decimal::ZERO;

    for position in account.positions.values() {
        let Ok(symbol) = symbols.get(position.symbol_id) else {
            continue;
        };
        unrealized_pnl += position.unrealized_pnl(symbol);
        pending_funding += position.pending_funding(symbol);
        notional += position.notional(symbol);
    }

    let equity = collateral_value + unrealized_pnl - pending_funding;
    let requirement = calculate_margin_requirement(notional, params);

    AccountMetrics {
        collateral_value,
        unrealized_pnl,
        pending_funding,
        equity,
        notional,
        initial_required: requirement.initial,
        maintenance_required: requirement.maintenance,
        margin_ratio: margin_ratio(equity, notional),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::b_token::BTokenSpec;
    use crate::symbol::{SymbolQuote, SymbolSpec};
    use crate::types::{Price, SignedSize, Timestamp};
    use rust_decimal_macros::dec;

    fn setup() -> (BTokenPool, SymbolRegistry) {
        let mut b_tokens = BTokenPool::new();
        b_tokens.add(BTokenSpec::new("USDT", 6, dec!(1))).unwrap();
        let sushi = b_tokens.add(BTokenSpec::new("SUSHI", 18, dec!(0.5))).unwrap();
        b_tokens.get_mut(sushi).unwrap().price = dec!(2);

        let mut symbols = SymbolRegistry::new();
        symbols
            .add(
                SymbolSpec::futures("BTCUSD", dec!(0.0001), dec!(0.0001), dec!(0.00001)),
                SymbolQuote {
                    spot: Price::new_unchecked(dec!(60000)),
                    mark: dec!(60000),
                    intrinsic_value: Decimal::ZERO,
                },
                Timestamp::default(),
            )
            .unwrap();
        (b_tokens, symbols)
    }

    #[test]
    fn buckets_credit_and_debit() {
        let mut account = MarginAccount::new(AccountId(1));
        account.credit(BTokenId(0), dec!(10));
        account.debit(BTokenId(0), dec!(10.06));
        assert_eq!(account.margin(BTokenId(0)), dec!(-0.06));
        assert_eq!(account.margin(BTokenId(3)), Decimal::ZERO);
    }

    #[test]
    fn active_set_tracks_positions() {
        let (_, symbols) = setup();
        let symbol = symbols.get(SymbolId(0)).unwrap();
        let mut account = MarginAccount::new(AccountId(1));

        let mut position = Position::new(symbol);
        position.volume = SignedSize::new(dec!(5));
        account.set_position(position.clone());
        assert!(account.active_symbol_ids.contains(&SymbolId(0)));

        position.volume = SignedSize::zero();
        account.set_position(position);
        assert!(!account.has_positions());
        assert!(account.get_position(SymbolId(0)).is_none());
    }

    #[test]
    fn metrics_value_discounted_collateral() {
        let (b_tokens, symbols) = setup();
        let params = PoolParams::default();
        let mut account = MarginAccount::new(AccountId(3));
        account.credit(BTokenId(1), dec!(200));
        account.credit(BTokenId(0), dec!(-0.06));

        let mut position = Position::new(symbols.get(SymbolId(0)).unwrap());
        position.volume = SignedSize::new(dec!(100));
        position.cost = dec!(600);
        account.set_position(position);

        let metrics = calculate_account_metrics(&account, &b_tokens, &symbols, &params);
        // 200 SUSHI * 2 * 0.5 - 0.06
        assert_eq!(metrics.collateral_value, dec!(199.94));
        assert_eq!(metrics.unrealized_pnl, Decimal::ZERO);
        assert_eq!(metrics.notional, dec!(600));
        assert_eq!(metrics.initial_required, dec!(60));
        assert!(metrics.meets_initial());
        assert_eq!(metrics.margin_ratio, Some(dec!(199.94) / dec!(600)));
    }

    #[test]
    fn ledger_drops_empty_accounts() {
        let mut ledger = MarginLedger::new();
        ledger.entry(AccountId(4)).credit(BTokenId(0), dec!(1));
        ledger.remove_if_empty(AccountId(4));
        assert!(ledger.get(AccountId(4)).is_some());

        ledger.entry(AccountId(4)).debit(BTokenId(0), dec!(1));
        ledger.remove_if_empty(AccountId(4));
        assert!(ledger.is_empty());
    }
}
