// 11.0: every committed state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists all event types.
// events of a failed operation are never published.

use crate::types::{AccountId, BTokenId, PoolId, Side, SignedSize, SymbolId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Liquidity events
    LiquidityAdded(LiquidityEvent),
    LiquidityRemoved(LiquidityEvent),
    PnlDistributed(PnlDistributedEvent),

    // Margin events
    MarginAdded(MarginEvent),
    MarginRemoved(MarginEvent),

    // Trade events
    Trade(TradeEvent),
    FundingAccrued(FundingAccruedEvent),

    // Risk events
    Liquidation(LiquidationEvent),

    // Registry events
    BTokenAdded(BTokenAddedEvent),
    BTokenParametersUpdated(BTokenParametersUpdatedEvent),
    SymbolAdded(SymbolAddedEvent),
    SymbolRemoved(SymbolRemovedEvent),
    SymbolParametersUpdated(SymbolParametersUpdatedEvent),
    CloseOnlyToggled(CloseOnlyToggledEvent),

    // Protocol events
    ProtocolFeeCollected(ProtocolFeeCollectedEvent),
    MigrationPrepared(MigrationPreparedEvent),
    MigrationApproved(MigrationApprovedEvent),
    MigrationExecuted(MigrationExecutedEvent),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::LiquidityAdded(_) => "liquidity_added",
            EventPayload::LiquidityRemoved(_) => "liquidity_removed",
            EventPayload::PnlDistributed(_) => "pnl_distributed",
            EventPayload::MarginAdded(_) => "margin_added",
            EventPayload::MarginRemoved(_) => "margin_removed",
            EventPayload::Trade(_) => "trade",
            EventPayload::FundingAccrued(_) => "funding_accrued",
            EventPayload::Liquidation(_) => "liquidation",
            EventPayload::BTokenAdded(_) => "btoken_added",
            EventPayload::BTokenParametersUpdated(_) => "btoken_parameters_updated",
            EventPayload::SymbolAdded(_) => "symbol_added",
            EventPayload::SymbolRemoved(_) => "symbol_removed",
            EventPayload::SymbolParametersUpdated(_) => "symbol_parameters_updated",
            EventPayload::CloseOnlyToggled(_) => "close_only_toggled",
            EventPayload::ProtocolFeeCollected(_) => "protocol_fee_collected",
            EventPayload::MigrationPrepared(_) => "migration_prepared",
            EventPayload::MigrationApproved(_) => "migration_approved",
            EventPayload::MigrationExecuted(_) => "migration_executed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityEvent {
    pub account_id: AccountId,
    pub b_token_id: BTokenId,
    pub shares: Decimal,
    // bToken units moved in or out of the vault
    pub amount: Decimal,
    // base-denominated pnl paid out with a removal, zero on add
    pub pnl_paid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlDistributedEvent {
    pub amount: Decimal,
    pub shares: Vec<(BTokenId, Decimal)>,
    pub parked: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginEvent {
    pub account_id: AccountId,
    pub b_token_id: BTokenId,
    pub amount: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub account_id: AccountId,
    pub symbol_id: SymbolId,
    pub side: Side,
    pub volume: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    pub realized_cost: Decimal,
    pub new_volume: SignedSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingAccruedEvent {
    pub symbol_id: SymbolId,
    pub funding_delta: Decimal,
    pub premium_funding_delta: Decimal,
    pub cumulative_funding_rate: Decimal,
    pub cumulative_premium_funding_rate: Decimal,
    pub pool_income: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub account_id: AccountId,
    pub liquidator: AccountId,
    pub symbols_closed: Vec<SymbolId>,
    pub notional_closed: Decimal,
    pub margin_before: Decimal,
    pub reward: Decimal,
    // residual equity handed to the pool, negative when LPs absorb a loss
    pub pool_residual: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTokenAddedEvent {
    pub b_token_id: BTokenId,
    pub name: String,
    pub discount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTokenParametersUpdatedEvent {
    pub b_token_id: BTokenId,
    pub old_discount: Decimal,
    pub new_discount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolAddedEvent {
    pub symbol_id: SymbolId,
    pub name: String,
    pub price: Decimal,
    pub reused_slot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRemovedEvent {
    pub symbol_id: SymbolId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolParametersUpdatedEvent {
    pub symbol_id: SymbolId,
    pub fee_ratio: Decimal,
    pub funding_coefficient: Decimal,
    pub premium_funding_coefficient: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseOnlyToggledEvent {
    pub symbol_id: SymbolId,
    pub close_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFeeCollectedEvent {
    pub collector: AccountId,
    pub amount: Decimal,
    pub total_collected: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPreparedEvent {
    pub target: PoolId,
    pub ready_at: Timestamp,
    pub replaced_proposal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationApprovedEvent {
    pub target: PoolId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationExecutedEvent {
    pub source: PoolId,
    pub target: PoolId,
    pub collateral: Vec<(BTokenId, Decimal)>,
}
