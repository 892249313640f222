// 8.0 engine/core.rs: the pool. owns the ledger, the collaborators and the event log.
// every mutating operation runs through transact: the ledger is cloned into a Staging,
// the operation mutates the staging copy, and only a successful operation swaps the
// copy in and publishes its events.

use super::config::{EngineConfig, PoolConfig};
use super::pricing::OracleQuotes;
use super::results::{ErrorClass, PoolError};
use super::state::{PoolState, ProtocolFeeAccrual};
use crate::account::AccountMetrics;
use crate::b_token::BToken;
use crate::collaborators::Collaborators;
use crate::events::{Event, EventId, EventPayload, PnlDistributedEvent};
use crate::lp::LpPosition;
use crate::migration::MigrationState;
use crate::position::Position;
use crate::symbol::Symbol;
use crate::types::{AccountId, BTokenId, PoolId, SymbolId, Timestamp, MAX_AMOUNT};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/** 8.1: one pool. all state lives in `state`, everything else is identity and plumbing */
#[derive(Debug)]
pub struct Pool {
    pub(super) id: PoolId,
    pub(super) controller: AccountId,
    pub(super) protocol_fee_collector: AccountId,
    pub(super) config: EngineConfig,
    pub(super) collaborators: Collaborators,
    pub(super) state: PoolState,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

/// Working copy of the ledger for one operation.
pub(super) struct Staging {
    pub(super) state: PoolState,
    pub(super) events: Vec<EventPayload>,
    pub(super) now: Timestamp,
}

impl Staging {
    pub(super) fn emit(&mut self, payload: EventPayload) {
        self.events.push(payload);
    }

    /// Routes pool-side pnl to LPs. parks it while no bToken holds liquidity and
    /// releases anything parked with the next distribution.
    pub(super) fn distribute_pnl(&mut self, amount: Decimal) {
        let total = amount + self.state.undistributed_pnl;
        if total.is_zero() {
            return;
        }
        match self.state.b_tokens.distribute_pnl(total) {
            Some(shares) => {
                self.state.undistributed_pnl = Decimal::ZERO;
                self.emit(EventPayload::PnlDistributed(PnlDistributedEvent {
                    amount: total,
                    shares,
                    parked: Decimal::ZERO,
                }));
            }
            None => {
                self.state.undistributed_pnl = total;
                self.emit(EventPayload::PnlDistributed(PnlDistributedEvent {
                    amount,
                    shares: Vec::new(),
                    parked: total,
                }));
            }
        }
    }
}

impl Pool {
    pub fn new(config: PoolConfig, collaborators: Collaborators) -> Result<Self, PoolError> {
        config.params.validate()?;
        info!(pool = config.id.0, controller = %config.controller, "pool created");
        Ok(Self {
            id: config.id,
            controller: config.controller,
            protocol_fee_collector: config.protocol_fee_collector,
            config: config.engine,
            collaborators,
            state: PoolState::new(config.params),
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn controller(&self) -> AccountId {
        self.controller
    }

    pub fn protocol_fee_collector(&self) -> AccountId {
        self.protocol_fee_collector
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    // queries

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn get_b_token(&self, b_token_id: BTokenId) -> Result<&BToken, PoolError> {
        self.state.b_tokens.get(b_token_id)
    }

    pub fn get_symbol(&self, symbol_id: SymbolId) -> Result<&Symbol, PoolError> {
        self.state.symbols.get(symbol_id)
    }

    pub fn get_position(&self, account: AccountId, symbol_id: SymbolId) -> Option<&Position> {
        self.state.margin_ledger.get(account)?.get_position(symbol_id)
    }

    /// Discounted base value of all of `account`'s collateral at the last quotes.
    pub fn get_margin(&self, account: AccountId) -> Decimal {
        self.state.margin_value(account)
    }

    pub fn get_margin_bucket(&self, account: AccountId, b_token_id: BTokenId) -> Decimal {
        self.state
            .margin_ledger
            .get(account)
            .map_or(Decimal::ZERO, |a| a.margin(b_token_id))
    }

    /// Total discounted liquidity value across bTokens.
    pub fn get_liquidity(&self) -> Decimal {
        self.state.b_tokens.total_liquidity_value()
    }

    pub fn get_lp_position(&self, account: AccountId, b_token_id: BTokenId) -> Option<&LpPosition> {
        self.state.lp_ledger.get(account, b_token_id)
    }

    pub fn get_protocol_fee_accrued(&self) -> ProtocolFeeAccrual {
        self.state.protocol_fee
    }

    pub fn get_active_symbol_ids(&self, account: AccountId) -> Vec<SymbolId> {
        self.state
            .margin_ledger
            .get(account)
            .map(|a| a.active_symbol_ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn account_metrics(&self, account: AccountId) -> Option<AccountMetrics> {
        self.state.account_metrics(account)
    }

    pub fn lp_equity(&self) -> Decimal {
        self.state.lp_equity()
    }

    pub fn migration_state(&self) -> MigrationState {
        self.state.migration
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn next_event_id(&self) -> u64 {
        self.next_event_id
    }

    // plumbing

    pub(super) fn ensure_controller(&self, caller: AccountId, action: &'static str) -> Result<(), PoolError> {
        if caller != self.controller {
            return Err(PoolError::Unauthorized {
                action,
                reason: "caller is not the pool controller",
            });
        }
        Ok(())
    }

    pub(super) fn ensure_active(&self, action: &'static str) -> Result<(), PoolError> {
        if self.state.migration.is_frozen() {
            return Err(PoolError::Unauthorized {
                action,
                reason: "pool is frozen by migration",
            });
        }
        Ok(())
    }

    /// Logs a failed pre-check the same way a rolled-back operation is logged. A
    /// frozen pool reports the freeze ahead of any input error.
    pub(super) fn check<T>(&self, op: &'static str, check: Result<T, PoolError>) -> Result<T, PoolError> {
        self.ensure_active(op)
            .and(check)
            .inspect_err(|e| log_rejection(self.id, op, e))
    }

    /// Runs `f` against a staged copy of the ledger. commits on Ok, discards on Err.
    pub(super) fn transact<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Staging) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let staged = self.ensure_active(op).and_then(|_| {
            let mut staging = self.stage();
            let value = f(&mut staging)?;
            Ok((value, staging))
        });
        self.finish(op, staged)
    }

    /// Same as transact, with every price refreshed (and funding accrued) first.
    pub(super) fn transact_quoted<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Staging) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let staged = self
            .ensure_active(op)
            .and_then(|_| self.quote())
            .and_then(|quotes: OracleQuotes| {
                let mut staging = self.stage();
                staging.apply_quotes(&quotes)?;
                let value = f(&mut staging)?;
                Ok((value, staging))
            });
        self.finish(op, staged)
    }

    pub(super) fn stage(&self) -> Staging {
        Staging {
            state: self.state.clone(),
            events: Vec::new(),
            now: self.current_time,
        }
    }

    pub(super) fn commit(&mut self, staging: Staging) {
        self.state = staging.state;
        for payload in staging.events {
            self.emit_event(payload);
        }
    }

    pub(super) fn finish<T>(&mut self, op: &'static str, staged: Result<(T, Staging), PoolError>) -> Result<T, PoolError> {
        match staged {
            Ok((value, staging)) => {
                self.commit(staging);
                Ok(value)
            }
            Err(e) => {
                log_rejection(self.id, op, &e);
                Err(e)
            }
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            info!(pool = self.id.0, event_id = event.id.0, kind = event.payload.kind(), "{:?}", event.payload);
        } else {
            debug!(pool = self.id.0, event_id = event.id.0, kind = event.payload.kind(), "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

/// Caller-supplied amounts must be positive and at most `MAX_AMOUNT`.
pub(super) fn ensure_amount(what: &'static str, value: Decimal) -> Result<(), PoolError> {
    if value <= Decimal::ZERO || value > MAX_AMOUNT {
        return Err(PoolError::InvalidAmount { what, value });
    }
    Ok(())
}

pub(super) fn log_rejection(pool: PoolId, op: &'static str, e: &PoolError) {
    match e.class() {
        ErrorClass::Expected | ErrorClass::Rejected => debug!(pool = pool.0, op, error = %e, "operation rejected"),
        ErrorClass::Misuse | ErrorClass::Infrastructure => warn!(pool = pool.0, op, error = %e, "operation rolled back"),
        ErrorClass::Invariant => error!(pool = pool.0, op, error = %e, "ledger invariant violated, operation rolled back"),
    }
}
