//! Trader collateral deposits and withdrawals.

use super::core::{ensure_amount, Pool};
use super::results::{MarginResult, PoolError};
use crate::events::{EventPayload, MarginEvent};
use crate::types::{AccountId, BTokenId};
use rust_decimal::Decimal;

impl Pool {
    pub fn add_margin(
        &mut self,
        account: AccountId,
        b_token_id: BTokenId,
        amount: Decimal,
    ) -> Result<MarginResult, PoolError> {
        self.transact("add_margin", |s| {
            ensure_amount("margin amount", amount)?;
            s.state.b_tokens.get(b_token_id)?;

            let margin = s.state.margin_ledger.entry(account);
            margin.credit(b_token_id, amount);
            let new_balance = margin.margin(b_token_id);
            s.state.vault.deposit(b_token_id, amount);

            s.emit(EventPayload::MarginAdded(MarginEvent {
                account_id: account,
                b_token_id,
                amount,
                new_balance,
            }));

            Ok(MarginResult {
                b_token_id,
                amount,
                new_balance,
                converted: Decimal::ZERO,
            })
        })
    }

    /// Withdraws collateral. Funding is settled first; a negative base bucket is
    /// covered out of the non-base collateral being withdrawn before the balance
    /// check. Accounts with open positions must still meet initial margin afterwards.
    pub fn remove_margin(
        &mut self,
        account: AccountId,
        b_token_id: BTokenId,
        amount: Decimal,
    ) -> Result<MarginResult, PoolError> {
        self.check("remove_margin", ensure_amount("margin amount", amount))?;

        self.transact_quoted("remove_margin", |s| {
            s.state.b_tokens.get(b_token_id)?;
            s.state.settle_account_funding(account);
            let converted = s.state.cover_base_debt_from(account, b_token_id)?;

            let Some(margin) = s.state.margin_ledger.get_mut(account) else {
                return Err(PoolError::InsufficientMargin {
                    required: amount,
                    available: Decimal::ZERO,
                });
            };
            let available = margin.margin(b_token_id);
            if amount > available {
                return Err(PoolError::InsufficientMargin {
                    required: amount,
                    available,
                });
            }
            margin.debit(b_token_id, amount);
            let new_balance = margin.margin(b_token_id);
            let has_positions = margin.has_positions();
            s.state.vault.withdraw(b_token_id, amount)?;

            if has_positions {
                if let Some(metrics) = s.state.account_metrics(account) {
                    if !metrics.meets_initial() {
                        return Err(PoolError::InsufficientMargin {
                            required: metrics.initial_required,
                            available: metrics.equity,
                        });
                    }
                }
            }
            s.state.margin_ledger.remove_if_empty(account);

            s.emit(EventPayload::MarginRemoved(MarginEvent {
                account_id: account,
                b_token_id,
                amount,
                new_balance,
            }));

            Ok(MarginResult {
                b_token_id,
                amount,
                new_balance,
                converted,
            })
        })
    }
}
