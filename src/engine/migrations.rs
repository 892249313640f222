// 8.6 engine/migrations.rs: timelocked handover of the whole ledger to a successor pool.
// prepare and approve run on the source; execute runs on the target and swaps both
// pools' state in one step after the per-bToken conservation check.

use super::core::{log_rejection, Pool};
use super::results::{MigrationResult, PoolError};
use super::state::PoolState;
use crate::events::{EventPayload, MigrationApprovedEvent, MigrationExecutedEvent, MigrationPreparedEvent};
use crate::migration::{verify_conservation, MigrationState};
use crate::types::{AccountId, PoolId, Timestamp};
use tracing::info;

impl Pool {
    /// Proposes `target` as successor, ready `delay_secs` from now. Re-proposing
    /// replaces the pending proposal.
    pub fn prepare_migration(
        &mut self,
        caller: AccountId,
        target: PoolId,
        delay_secs: u64,
    ) -> Result<Timestamp, PoolError> {
        self.check("prepare_migration", self.ensure_controller(caller, "prepare_migration"))?;

        self.transact("prepare_migration", |s| {
            let replaced_proposal = matches!(s.state.migration, MigrationState::Proposed { .. });
            let ready_at = s.now.plus_secs(delay_secs);
            s.state.migration = s.state.migration.propose(target, ready_at)?;
            s.emit(EventPayload::MigrationPrepared(MigrationPreparedEvent {
                target,
                ready_at,
                replaced_proposal,
            }));
            Ok(ready_at)
        })
        .inspect(|ready_at| info!(pool = self.id.0, target = target.0, ready_at = %ready_at, "migration proposed"))
    }

    /// Approves the pending proposal once its timelock has passed. The pool is
    /// frozen from here on.
    pub fn approve_migration(&mut self, caller: AccountId) -> Result<PoolId, PoolError> {
        self.check("approve_migration", self.ensure_controller(caller, "approve_migration"))?;

        self.transact("approve_migration", |s| {
            let approved = s.state.migration.approve(s.now)?;
            s.state.migration = approved;
            let target = approved.target().ok_or(PoolError::MigrationNotReady {
                ready_at: None,
                now: s.now,
            })?;
            s.emit(EventPayload::MigrationApproved(MigrationApprovedEvent { target }));
            Ok(target)
        })
    }

    /// Pulls the ledger of `source`, which must have approved this pool as its target.
    pub fn execute_migration(&mut self, caller: AccountId, source: &mut Pool) -> Result<MigrationResult, PoolError> {
        self.check("execute_migration", self.ensure_controller(caller, "execute_migration"))?;

        let (target_state, source_state, result) = match self.stage_migration(source) {
            Ok(staged) => staged,
            Err(e) => {
                log_rejection(self.id, "execute_migration", &e);
                return Err(e);
            }
        };

        self.state = target_state;
        source.state = source_state;
        // the ledger's accrual snapshots are on the source clock
        self.current_time = self.current_time.max(source.current_time);

        let event = MigrationExecutedEvent {
            source: result.source,
            target: result.target,
            collateral: result.collateral.clone(),
        };
        source.emit_event(EventPayload::MigrationExecuted(event.clone()));
        self.emit_event(EventPayload::MigrationExecuted(event));

        info!(
            source = result.source.0,
            target = result.target.0,
            lp_positions = result.lp_positions,
            margin_accounts = result.margin_accounts,
            "migration executed"
        );
        Ok(result)
    }

    fn stage_migration(&self, source: &Pool) -> Result<(PoolState, PoolState, MigrationResult), PoolError> {
        self.ensure_active("execute_migration")?;
        if self.state.migrated_from.is_some() {
            return Err(PoolError::AlreadyMigrated);
        }
        let executed = source.state.migration.execute(self.id, self.current_time)?;
        if self.state.holds_ledger() {
            return Err(PoolError::MigrationTargetNotEmpty(self.id));
        }

        let source_before = source.state.collateral_snapshot();
        let target_before = self.state.collateral_snapshot();

        let mut target = source.state.clone();
        target.params = self.state.params.clone();
        target.migration = MigrationState::None;
        target.migrated_from = Some(source.id);
        target.vault = self.state.vault.clone();
        let mut source_vault = source.state.vault.clone();
        source_vault.drain_into(&mut target.vault);

        verify_conservation(&source_before, &target_before, &target.collateral_snapshot())?;

        let mut drained = PoolState::new(source.state.params.clone());
        drained.migration = executed;

        let result = MigrationResult {
            source: source.id,
            target: self.id,
            collateral: source_before.into_iter().collect(),
            lp_positions: target.lp_ledger.iter().count(),
            margin_accounts: target.margin_ledger.iter().count(),
        };
        Ok((target, drained, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::PoolConfig;
    use crate::symbol::SymbolSpec;
    use crate::types::{BTokenId, SymbolId};
    use crate::engine::testing::{Fixture, BTCUSD, CONTROLLER, LP, SUSHI, TRADER, USDT};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const TARGET: PoolId = PoolId(2);

    fn successor(fx: &Fixture) -> Pool {
        Pool::new(PoolConfig::new(TARGET, CONTROLLER), fx.pool.collaborators().clone()).unwrap()
    }

    fn approved() -> Fixture {
        let mut fx = Fixture::new();
        fx.pool.add_margin(TRADER, SUSHI, dec!(200)).unwrap();
        fx.pool.trade(TRADER, BTCUSD, dec!(100)).unwrap();
        fx.pool.prepare_migration(CONTROLLER, TARGET, 3600).unwrap();
        fx.pool.advance_time(3_600_000);
        fx.pool.approve_migration(CONTROLLER).unwrap();
        fx
    }

    #[test]
    fn timelock_enforced() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.pool.prepare_migration(TRADER, TARGET, 10),
            Err(PoolError::Unauthorized { .. })
        ));
        assert!(matches!(
            fx.pool.approve_migration(CONTROLLER),
            Err(PoolError::MigrationNotReady { ready_at: None, .. })
        ));

        let ready_at = fx.pool.prepare_migration(CONTROLLER, TARGET, 10).unwrap();
        assert_eq!(ready_at, Timestamp::from_secs(10));
        fx.pool.advance_time(9_999);
        assert_eq!(
            fx.pool.approve_migration(CONTROLLER),
            Err(PoolError::MigrationNotReady {
                ready_at: Some(ready_at),
                now: Timestamp::from_millis(9_999),
            })
        );
        fx.pool.advance_time(1);
        assert_eq!(fx.pool.approve_migration(CONTROLLER), Ok(TARGET));
        assert!(matches!(
            fx.pool.approve_migration(CONTROLLER),
            Err(PoolError::Unauthorized { .. })
        ));
    }

    #[test]
    fn reproposal_replaces_target() {
        let mut fx = Fixture::new();
        fx.pool.prepare_migration(CONTROLLER, PoolId(9), 10).unwrap();
        fx.pool.prepare_migration(CONTROLLER, TARGET, 20).unwrap();
        assert_eq!(
            fx.pool.migration_state(),
            MigrationState::Proposed {
                target: TARGET,
                ready_at: Timestamp::from_secs(20),
            }
        );
    }

    #[test]
    fn approved_source_is_inert() {
        let mut fx = approved();
        let before = fx.pool.state().clone();

        assert!(matches!(fx.pool.trade(TRADER, BTCUSD, dec!(-100)), Err(PoolError::Unauthorized { .. })));
        assert!(matches!(fx.pool.add_margin(TRADER, USDT, dec!(1)), Err(PoolError::Unauthorized { .. })));
        assert!(matches!(fx.pool.remove_liquidity(LP, USDT, dec!(1)), Err(PoolError::Unauthorized { .. })));
        assert!(matches!(fx.pool.collect_protocol_fee(), Err(PoolError::Unauthorized { .. })));
        assert!(matches!(
            fx.pool.prepare_migration(CONTROLLER, PoolId(5), 0),
            Err(PoolError::Unauthorized { .. })
        ));

        // the freeze is reported ahead of anything wrong with the input
        let frozen = |action| PoolError::Unauthorized {
            action,
            reason: "pool is frozen by migration",
        };
        assert_eq!(fx.pool.trade(TRADER, SymbolId(9), dec!(1)), Err(frozen("trade")));
        assert_eq!(fx.pool.trade(TRADER, BTCUSD, Decimal::ZERO), Err(frozen("trade")));
        assert_eq!(fx.pool.add_liquidity(LP, USDT, Decimal::ZERO), Err(frozen("add_liquidity")));
        assert_eq!(fx.pool.remove_liquidity(LP, BTokenId(7), dec!(1)), Err(frozen("remove_liquidity")));
        assert_eq!(fx.pool.add_margin(TRADER, USDT, Decimal::ZERO), Err(frozen("add_margin")));
        assert_eq!(fx.pool.remove_margin(TRADER, USDT, Decimal::ZERO), Err(frozen("remove_margin")));
        assert_eq!(fx.pool.liquidate(LP, AccountId(77)), Err(frozen("liquidate")));
        assert_eq!(fx.pool.remove_symbol(CONTROLLER, SymbolId(9)), Err(frozen("remove_symbol")));
        assert_eq!(fx.pool.toggle_close_only(CONTROLLER, SymbolId(9)), Err(frozen("toggle_close_only")));
        assert_eq!(
            fx.pool.set_b_token_parameters(CONTROLLER, BTokenId(7), dec!(2)),
            Err(frozen("set_b_token_parameters"))
        );
        // no oracle price for this id, the freeze still wins
        assert_eq!(
            fx.pool.add_symbol(CONTROLLER, SymbolSpec::futures("ETHUSD", dec!(0.001), dec!(0.0002), dec!(0.00002))),
            Err(frozen("add_symbol"))
        );
        assert_eq!(fx.pool.state(), &before);
    }

    #[test]
    fn execution_moves_everything() {
        let mut fx = approved();
        let mut target = successor(&fx);
        let source_state = fx.pool.state().clone();

        let result = target.execute_migration(CONTROLLER, &mut fx.pool).unwrap();
        assert_eq!(result.source, PoolId(1));
        assert_eq!(result.lp_positions, 1);
        assert_eq!(result.margin_accounts, 1);

        assert_eq!(target.state().vault, source_state.vault);
        assert_eq!(target.state().margin_ledger, source_state.margin_ledger);
        assert_eq!(target.state().symbols, source_state.symbols);
        assert_eq!(target.get_protocol_fee_accrued().uncollected, dec!(0.06));
        assert_eq!(target.state().migrated_from, Some(PoolId(1)));

        assert_eq!(fx.pool.migration_state(), MigrationState::Executed { target: TARGET });
        assert!(!fx.pool.state().holds_ledger());
        assert_eq!(fx.pool.state().vault.balance(USDT), Decimal::ZERO);

        // the target is live
        target.set_time(fx.pool.time());
        target.trade(TRADER, BTCUSD, dec!(-100)).unwrap();

        assert_eq!(
            target.execute_migration(CONTROLLER, &mut fx.pool),
            Err(PoolError::AlreadyMigrated)
        );
        let mut other = Pool::new(PoolConfig::new(TARGET, CONTROLLER), fx.pool.collaborators().clone()).unwrap();
        assert_eq!(
            other.execute_migration(CONTROLLER, &mut fx.pool),
            Err(PoolError::AlreadyMigrated)
        );
    }

    #[test]
    fn target_clock_catches_up_with_the_ledger() {
        let mut fx = Fixture::new();
        fx.fund_trader_base(dec!(100));
        fx.pool.trade(TRADER, BTCUSD, dec!(100)).unwrap();
        fx.pool.advance_time(3_600_000);
        fx.pool.update_prices().unwrap();
        fx.pool.prepare_migration(CONTROLLER, TARGET, 0).unwrap();
        fx.pool.approve_migration(CONTROLLER).unwrap();

        let mut target = successor(&fx);
        assert_eq!(target.time(), Timestamp::from_millis(0));
        target.execute_migration(CONTROLLER, &mut fx.pool).unwrap();
        assert_eq!(target.time(), Timestamp::from_secs(3600));

        // nothing elapsed on the ledger's clock, so nothing accrues
        let before = target.get_symbol(BTCUSD).unwrap().clone();
        target.update_prices().unwrap();
        let after = target.get_symbol(BTCUSD).unwrap();
        assert_eq!(after.last_update, Timestamp::from_secs(3600));
        assert_eq!(after.cumulative_funding_rate, before.cumulative_funding_rate);
    }

    #[test]
    fn execution_preconditions() {
        let mut fx = Fixture::new();
        let mut target = successor(&fx);
        assert!(matches!(
            target.execute_migration(CONTROLLER, &mut fx.pool),
            Err(PoolError::MigrationNotReady { .. })
        ));

        let mut fx = approved();
        let mut wrong = Pool::new(PoolConfig::new(PoolId(3), CONTROLLER), fx.pool.collaborators().clone()).unwrap();
        assert!(matches!(
            wrong.execute_migration(CONTROLLER, &mut fx.pool),
            Err(PoolError::MigrationNotReady { .. })
        ));

        let mut busy = successor(&fx);
        busy.add_b_token(CONTROLLER, crate::b_token::BTokenSpec::new("USDC", 6, dec!(1))).unwrap();
        assert_eq!(
            busy.execute_migration(CONTROLLER, &mut fx.pool),
            Err(PoolError::MigrationTargetNotEmpty(TARGET))
        );
        assert!(matches!(
            target.execute_migration(TRADER, &mut fx.pool),
            Err(PoolError::Unauthorized { .. })
        ));
        assert!(matches!(fx.pool.migration_state(), MigrationState::Approved { .. }));
    }
}
