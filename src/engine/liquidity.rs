//! bToken registration and liquidity provision.

use super::core::{ensure_amount, Pool};
use super::results::{LiquidityResult, PoolError};
use crate::b_token::{validate_discount, BTokenSpec};
use crate::events::{BTokenAddedEvent, BTokenParametersUpdatedEvent, EventPayload, LiquidityEvent};
use crate::types::{AccountId, BTokenId};
use rust_decimal::Decimal;

impl Pool {
    /// Registers a collateral type. The first one registered is the base.
    pub fn add_b_token(&mut self, caller: AccountId, spec: BTokenSpec) -> Result<BTokenId, PoolError> {
        self.check("add_b_token", self.ensure_controller(caller, "add_b_token"))?;

        self.transact("add_b_token", |s| {
            let name = spec.name.clone();
            let discount = spec.discount;
            let b_token_id = s.state.b_tokens.add(spec)?;
            s.emit(EventPayload::BTokenAdded(BTokenAddedEvent {
                b_token_id,
                name,
                discount,
            }));
            Ok(b_token_id)
        })
    }

    pub fn set_b_token_parameters(
        &mut self,
        caller: AccountId,
        b_token_id: BTokenId,
        discount: Decimal,
    ) -> Result<(), PoolError> {
        self.check("set_b_token_parameters", self.ensure_controller(caller, "set_b_token_parameters"))?;

        self.transact_quoted("set_b_token_parameters", |s| {
            validate_discount(discount)?;
            if b_token_id.is_base() && discount != Decimal::ONE {
                return Err(PoolError::InvalidAmount {
                    what: "base discount",
                    value: discount,
                });
            }
            let token = s.state.b_tokens.get_mut(b_token_id)?;
            let old_discount = token.discount;
            token.discount = discount;
            s.state.check_base_ratio()?;

            s.emit(EventPayload::BTokenParametersUpdated(BTokenParametersUpdatedEvent {
                b_token_id,
                old_discount,
                new_discount: discount,
            }));
            Ok(())
        })
    }

    /// Mints `amount` shares of `b_token_id` against `amount` units deposited.
    pub fn add_liquidity(
        &mut self,
        account: AccountId,
        b_token_id: BTokenId,
        amount: Decimal,
    ) -> Result<LiquidityResult, PoolError> {
        self.check(
            "add_liquidity",
            ensure_amount("liquidity amount", amount).and_then(|_| self.state.b_tokens.get(b_token_id).map(|_| ())),
        )?;

        self.transact_quoted("add_liquidity", |s| {
            let cumulative = s.state.b_tokens.get(b_token_id)?.cumulative_pnl_per_share;
            let lp = s.state.lp_ledger.entry(account, b_token_id, cumulative);
            lp.settle(cumulative);
            lp.shares += amount;
            let remaining_shares = lp.shares;

            s.state.b_tokens.get_mut(b_token_id)?.liquidity += amount;
            s.state.vault.deposit(b_token_id, amount);

            if !b_token_id.is_base() {
                s.state.check_base_ratio()?;
            }

            s.emit(EventPayload::LiquidityAdded(LiquidityEvent {
                account_id: account,
                b_token_id,
                shares: amount,
                amount,
                pnl_paid: Decimal::ZERO,
            }));

            Ok(LiquidityResult {
                b_token_id,
                shares: amount,
                amount,
                pnl_paid: Decimal::ZERO,
                remaining_shares,
            })
        })
    }

    /// Burns `shares` and pays out principal plus the pro-rata slice of realized pnl.
    /// Gains are paid in base, up to what the base vault holds; a loss is taken out of
    /// the principal, converted at the quoted rate for non-base bTokens.
    pub fn remove_liquidity(
        &mut self,
        account: AccountId,
        b_token_id: BTokenId,
        shares: Decimal,
    ) -> Result<LiquidityResult, PoolError> {
        self.check(
            "remove_liquidity",
            ensure_amount("shares", shares).and_then(|_| self.state.b_tokens.get(b_token_id).map(|_| ())),
        )?;

        self.transact_quoted("remove_liquidity", |s| {
            s.state.settle_lp(account, b_token_id)?;
            let price = s.state.b_tokens.get(b_token_id)?.price;

            let Some(lp) = s.state.lp_ledger.get_mut(account, b_token_id) else {
                return Err(PoolError::InsufficientShares {
                    b_token_id,
                    requested: shares,
                    available: Decimal::ZERO,
                });
            };
            if shares > lp.shares {
                return Err(PoolError::InsufficientShares {
                    b_token_id,
                    requested: shares,
                    available: lp.shares,
                });
            }

            let pnl = lp.pnl_for(shares);
            lp.pnl -= pnl;
            lp.shares -= shares;
            let remaining_shares = lp.shares;

            let token = s.state.b_tokens.get_mut(b_token_id)?;
            token.liquidity -= shares;
            token.pnl -= pnl;

            // (bToken units out, base pnl paid or deducted, loss left uncovered)
            let (amount, pnl_paid, uncovered) = if pnl >= Decimal::ZERO {
                (shares, pnl, Decimal::ZERO)
            } else if b_token_id.is_base() {
                let covered = (-pnl).min(shares);
                (shares - covered, -covered, -pnl - covered)
            } else {
                let loss = -pnl;
                let units = if price > Decimal::ZERO {
                    (loss / price).min(shares)
                } else {
                    shares
                };
                let base_amount = units * price;
                s.state.vault.convert_to_base(b_token_id, units, base_amount)?;
                (shares - units, -base_amount, loss - base_amount)
            };

            s.state.vault.withdraw(b_token_id, amount)?;
            let mut pnl_paid = pnl_paid;
            if pnl_paid > Decimal::ZERO {
                // gains the vault cannot back yet stay with the position
                let unpaid = (pnl_paid - s.state.vault.balance(BTokenId::BASE)).max(Decimal::ZERO);
                if unpaid > Decimal::ZERO {
                    let token = s.state.b_tokens.get_mut(b_token_id)?;
                    token.pnl += unpaid;
                    let cumulative = token.cumulative_pnl_per_share;
                    s.state.lp_ledger.entry(account, b_token_id, cumulative).pnl += unpaid;
                    pnl_paid -= unpaid;
                }
                s.state.vault.withdraw(BTokenId::BASE, pnl_paid)?;
            }
            s.state.lp_ledger.remove_if_empty(account, b_token_id);
            if uncovered > Decimal::ZERO {
                s.distribute_pnl(-uncovered);
            }

            if b_token_id.is_base() {
                s.state.check_base_ratio()?;
            }
            s.state.check_pool_margin()?;

            s.emit(EventPayload::LiquidityRemoved(LiquidityEvent {
                account_id: account,
                b_token_id,
                shares,
                amount,
                pnl_paid,
            }));

            Ok(LiquidityResult {
                b_token_id,
                shares,
                amount,
                pnl_paid,
                remaining_shares,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolParams;
    use crate::engine::testing::{Fixture, BTCUSD, CONTROLLER, LP, SUSHI, TRADER, USDT};
    use rust_decimal_macros::dec;

    const LP2: AccountId = AccountId(7);

    #[test]
    fn only_controller_registers_btokens() {
        let mut fx = Fixture::new();
        let err = fx
            .pool
            .add_b_token(LP, BTokenSpec::new("WETH", 18, dec!(0.8)))
            .unwrap_err();
        assert!(matches!(err, PoolError::Unauthorized { action: "add_b_token", .. }));
        assert_eq!(fx.pool.state().b_tokens.len(), 2);
    }

    #[test]
    fn liquidity_round_trip() {
        let mut fx = Fixture::new();
        let liquidity = fx.pool.get_liquidity();

        let added = fx.pool.add_liquidity(LP2, USDT, dec!(2500)).unwrap();
        assert_eq!(added.remaining_shares, dec!(2500));
        let removed = fx.pool.remove_liquidity(LP2, USDT, dec!(2500)).unwrap();
        assert_eq!(removed.amount, dec!(2500));
        assert_eq!(removed.pnl_paid, Decimal::ZERO);

        assert_eq!(fx.pool.get_liquidity(), liquidity);
        assert!(fx.pool.get_lp_position(LP2, USDT).is_none());
        assert_eq!(fx.pool.state().vault.balance(USDT), dec!(10000));
    }

    #[test]
    fn invalid_amounts() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.pool.add_liquidity(LP, USDT, Decimal::ZERO),
            Err(PoolError::InvalidAmount { .. })
        ));
        assert_eq!(
            fx.pool.add_liquidity(LP, BTokenId(9), dec!(1)),
            Err(PoolError::InvalidBTokenId(BTokenId(9)))
        );
        assert_eq!(
            fx.pool.remove_liquidity(LP, USDT, dec!(10001)),
            Err(PoolError::InsufficientShares {
                b_token_id: USDT,
                requested: dec!(10001),
                available: dec!(10000),
            })
        );
        assert!(matches!(
            fx.pool.remove_liquidity(LP2, USDT, dec!(1)),
            Err(PoolError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn base_ratio_limits_non_base_liquidity() {
        let mut fx = Fixture::new();
        // 50000 SUSHI * 2 * 0.5 = 50000 against 10000 base: 1/6 < 0.2
        let err = fx.pool.add_liquidity(LP2, SUSHI, dec!(50000)).unwrap_err();
        assert!(matches!(err, PoolError::BaseCollateralRatioTooLow { .. }));

        // exactly 0.2
        fx.pool.add_liquidity(LP2, SUSHI, dec!(40000)).unwrap();
        assert_eq!(fx.pool.get_liquidity(), dec!(50000));

        // and the base side cannot leave either
        let err = fx.pool.remove_liquidity(LP, USDT, dec!(1)).unwrap_err();
        assert!(matches!(err, PoolError::BaseCollateralRatioTooLow { .. }));
    }

    #[test]
    fn fee_income_paid_in_base() {
        let mut params = PoolParams::default();
        params.protocol_fee_collect_ratio = Decimal::ZERO;
        let mut fx = Fixture::with_params(params);
        fx.fund_trader_base(dec!(1000));
        fx.pool.trade(TRADER, BTCUSD, dec!(100)).unwrap();

        // half the shares take half of the 0.06 fee
        let removed = fx.pool.remove_liquidity(LP, USDT, dec!(5000)).unwrap();
        assert_eq!(removed.amount, dec!(5000));
        assert_eq!(removed.pnl_paid, dec!(0.03));
        assert_eq!(fx.pool.get_lp_position(LP, USDT).unwrap().pnl, dec!(0.03));
    }

    #[test]
    fn backing_collateral_cannot_leave() {
        let mut fx = Fixture::new();
        fx.fund_trader_base(dec!(1000));
        fx.pool.trade(TRADER, BTCUSD, dec!(100)).unwrap();

        let err = fx.pool.remove_liquidity(LP, USDT, dec!(9500)).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientPoolMargin {
                required: dec!(600),
                available: dec!(500),
            }
        );
        assert_eq!(fx.pool.get_lp_position(LP, USDT).unwrap().shares, dec!(10000));
    }

    #[test]
    fn non_base_loss_deducted_from_principal() {
        let mut fx = Fixture::new();
        fx.pool.add_liquidity(LP2, SUSHI, dec!(10000)).unwrap();
        fx.fund_trader_base(dec!(1000));

        fx.pool.trade(TRADER, BTCUSD, dec!(100)).unwrap();
        fx.set_price(BTCUSD, dec!(61000));
        let close = fx.pool.trade(TRADER, BTCUSD, dec!(-100)).unwrap();
        assert_eq!(close.realized_pnl, dec!(10));

        // the 10 loss splits 50/50 by discounted value. SUSHI's 5 is 2.5 units at 2
        let removed = fx.pool.remove_liquidity(LP2, SUSHI, dec!(10000)).unwrap();
        assert_eq!(removed.pnl_paid, dec!(-5));
        assert_eq!(removed.amount, dec!(9997.5));
        assert_eq!(fx.pool.state().vault.balance(SUSHI), Decimal::ZERO);
        assert!(fx.pool.get_lp_position(LP2, SUSHI).is_none());
    }

    #[test]
    fn discount_update() {
        let mut fx = Fixture::new();
        fx.pool.set_b_token_parameters(CONTROLLER, SUSHI, dec!(0.6)).unwrap();
        assert_eq!(fx.pool.get_b_token(SUSHI).unwrap().discount, dec!(0.6));
        assert!(matches!(
            fx.pool.set_b_token_parameters(CONTROLLER, USDT, dec!(0.9)),
            Err(PoolError::InvalidAmount { what: "base discount", .. })
        ));
        assert!(fx.pool.set_b_token_parameters(TRADER, SUSHI, dec!(0.7)).is_err());
    }

    #[test]
    fn bad_input_is_rejected_before_it_overflows() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.pool.add_liquidity(LP2, USDT, Decimal::MAX),
            Err(PoolError::InvalidAmount { what: "liquidity amount", .. })
        ));
        assert!(matches!(
            fx.pool.remove_liquidity(LP, USDT, Decimal::MAX),
            Err(PoolError::InvalidAmount { what: "shares", .. })
        ));
        assert_eq!(fx.pool.get_liquidity(), dec!(10000));
    }

    #[test]
    fn unbacked_gains_stay_with_the_lp() {
        let mut fx = Fixture::new();
        fx.fund_trader_base(dec!(100));
        fx.pool.trade(TRADER, BTCUSD, dec!(150)).unwrap();
        // closing never needs margin, so a base-only trader can end up in debt
        fx.set_price(BTCUSD, dec!(50000));
        fx.pool.trade(TRADER, BTCUSD, dec!(-150)).unwrap();
        assert_eq!(fx.pool.get_margin_bucket(TRADER, USDT), dec!(-50.165));

        // 150 owed to the LP, only 100 of it ever reached the vault
        let removed = fx.pool.remove_liquidity(LP, USDT, dec!(10000)).unwrap();
        assert_eq!(removed.amount, dec!(10000));
        assert_eq!(removed.pnl_paid, dec!(100));
        let lp = fx.pool.get_lp_position(LP, USDT).unwrap();
        assert_eq!(lp.shares, Decimal::ZERO);
        assert_eq!(lp.pnl, dec!(50));
        assert_eq!(fx.pool.state().vault.balance(USDT), Decimal::ZERO);

        assert_eq!(fx.pool.collect_protocol_fee().unwrap(), Decimal::ZERO);
        assert_eq!(fx.pool.get_protocol_fee_accrued().uncollected, dec!(0.165));
    }
}
