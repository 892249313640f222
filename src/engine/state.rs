// 8.2 engine/state.rs: the persisted ledger of one pool. every operation works on a
// staged clone of this and the pool swaps it in only on success.

use crate::account::{calculate_account_metrics, AccountMetrics, MarginLedger};
use crate::b_token::BTokenPool;
use crate::config::PoolParams;
use crate::custody::Vault;
use crate::lp::LpLedger;
use crate::margin::pool_margin_required;
use crate::migration::{CollateralSnapshot, MigrationState};
use crate::symbol::SymbolRegistry;
use crate::types::{AccountId, BTokenId, PoolId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::results::PoolError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFeeAccrual {
    // paid out to the collector, never decreases
    pub collected: Decimal,
    // sitting in the base vault
    pub uncollected: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub params: PoolParams,
    pub b_tokens: BTokenPool,
    pub symbols: SymbolRegistry,
    pub lp_ledger: LpLedger,
    pub margin_ledger: MarginLedger,
    pub vault: Vault,
    pub protocol_fee: ProtocolFeeAccrual,
    // pool pnl that arrived while no bToken held liquidity
    pub undistributed_pnl: Decimal,
    pub migration: MigrationState,
    // set on a pool that received another pool's ledger
    pub migrated_from: Option<PoolId>,
}

impl PoolState {
    pub fn new(params: PoolParams) -> Self {
        Self {
            params,
            b_tokens: BTokenPool::new(),
            symbols: SymbolRegistry::new(),
            lp_ledger: LpLedger::new(),
            margin_ledger: MarginLedger::new(),
            vault: Vault::new(),
            protocol_fee: ProtocolFeeAccrual::default(),
            undistributed_pnl: Decimal::ZERO,
            migration: MigrationState::None,
            migrated_from: None,
        }
    }

    /// Liquidity funding is normalised by: discounted principal plus bucket pnl.
    pub fn funding_liquidity(&self) -> Decimal {
        self.b_tokens.total_liquidity_value() + self.b_tokens.total_pnl()
    }

    /// What LPs own if every trader closed at the current marks.
    pub fn lp_equity(&self) -> Decimal {
        self.funding_liquidity() + self.undistributed_pnl - self.symbols.traders_unrealized_pnl()
    }

    pub fn check_pool_margin(&self) -> Result<(), PoolError> {
        let required = pool_margin_required(self.symbols.total_net_notional(), &self.params);
        if required.is_zero() {
            return Ok(());
        }
        let available = self.lp_equity();
        if available < required {
            return Err(PoolError::InsufficientPoolMargin { required, available });
        }
        Ok(())
    }

    pub fn check_base_ratio(&self) -> Result<(), PoolError> {
        match self.b_tokens.base_ratio() {
            Some(ratio) if ratio < self.params.min_b_token0_ratio => Err(PoolError::BaseCollateralRatioTooLow {
                ratio,
                minimum: self.params.min_b_token0_ratio,
            }),
            _ => Ok(()),
        }
    }

    /// Charges every open position of `owner` its pending funding against the base
    /// bucket and snapshots the accumulators. Returns the total charged.
    pub fn settle_account_funding(&mut self, owner: AccountId) -> Decimal {
        let Self {
            symbols,
            margin_ledger,
            ..
        } = self;
        let Some(account) = margin_ledger.get_mut(owner) else {
            return Decimal::ZERO;
        };

        let mut charged = Decimal::ZERO;
        for position in account.positions.values_mut() {
            if let Ok(symbol) = symbols.get(position.symbol_id) {
                charged += position.settle_funding(symbol);
            }
        }
        account.debit(BTokenId::BASE, charged);
        charged
    }

    /// Sells `owner`'s `b_token_id` collateral at its quoted price until the base
    /// bucket is back at zero or the bucket runs dry. Returns the units sold.
    pub fn cover_base_debt_from(&mut self, owner: AccountId, b_token_id: BTokenId) -> Result<Decimal, PoolError> {
        if b_token_id.is_base() {
            return Ok(Decimal::ZERO);
        }
        let price = self.b_tokens.get(b_token_id)?.price;
        let Some(account) = self.margin_ledger.get_mut(owner) else {
            return Ok(Decimal::ZERO);
        };
        let debt = -account.margin(BTokenId::BASE);
        let held = account.margin(b_token_id);
        if debt <= Decimal::ZERO || held <= Decimal::ZERO || price <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        let units = (debt / price).min(held);
        let base_amount = units * price;
        account.debit(b_token_id, units);
        account.credit(BTokenId::BASE, base_amount);
        self.vault.convert_to_base(b_token_id, units, base_amount)?;
        Ok(units)
    }

    /// Covers a negative base bucket out of every non-base bucket in id order, so
    /// everything credited to the pool is backed by base in the vault.
    pub fn cover_base_debt(&mut self, owner: AccountId) -> Result<(), PoolError> {
        let held = self
            .margin_ledger
            .get(owner)
            .map(|account| account.non_base_collateral())
            .unwrap_or_default();
        for (b_token_id, _) in held {
            self.cover_base_debt_from(owner, b_token_id)?;
        }
        Ok(())
    }

    /// Realizes pending LP pnl of one position. Returns the amount realized.
    pub fn settle_lp(&mut self, owner: AccountId, b_token_id: BTokenId) -> Result<Decimal, PoolError> {
        let cumulative = self.b_tokens.get(b_token_id)?.cumulative_pnl_per_share;
        Ok(self
            .lp_ledger
            .get_mut(owner, b_token_id)
            .map_or(Decimal::ZERO, |lp| lp.settle(cumulative)))
    }

    pub fn account_metrics(&self, owner: AccountId) -> Option<AccountMetrics> {
        let account = self.margin_ledger.get(owner)?;
        Some(calculate_account_metrics(
            account,
            &self.b_tokens,
            &self.symbols,
            &self.params,
        ))
    }

    /// Discounted base value of every collateral bucket of `owner`.
    pub fn margin_value(&self, owner: AccountId) -> Decimal {
        let Some(account) = self.margin_ledger.get(owner) else {
            return Decimal::ZERO;
        };
        account
            .margins
            .iter()
            .map(|(id, amount)| self.b_tokens.get(*id).map_or(Decimal::ZERO, |t| t.collateral_value(*amount)))
            .sum()
    }

    /// Anything a migration would overwrite.
    pub fn holds_ledger(&self) -> bool {
        !self.b_tokens.is_empty()
            || !self.symbols.is_empty()
            || !self.lp_ledger.is_empty()
            || !self.margin_ledger.is_empty()
            || !self.vault.is_empty()
            || !self.protocol_fee.uncollected.is_zero()
            || !self.undistributed_pnl.is_zero()
    }

    pub fn collateral_snapshot(&self) -> CollateralSnapshot {
        self.vault.balances().clone()
    }
}
