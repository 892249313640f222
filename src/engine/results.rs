// 8.0.2: result types and errors for pool operations.

use crate::collaborators::CollaboratorError;
use crate::config::ConfigError;
use crate::types::{AccountId, BTokenId, PoolId, SignedSize, SymbolId, Timestamp};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityResult {
    pub b_token_id: BTokenId,
    pub shares: Decimal,
    // bToken units moved in (add) or out (remove)
    pub amount: Decimal,
    // base-denominated pnl paid out with a removal
    pub pnl_paid: Decimal,
    pub remaining_shares: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarginResult {
    pub b_token_id: BTokenId,
    pub amount: Decimal,
    pub new_balance: Decimal,
    // non-base collateral converted to cover a negative base bucket
    pub converted: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeResult {
    pub symbol_id: SymbolId,
    pub price: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    pub protocol_fee: Decimal,
    pub realized_pnl: Decimal,
    pub funding_paid: Decimal,
    pub new_volume: SignedSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationResult {
    pub account_id: AccountId,
    pub liquidator: AccountId,
    pub symbols_closed: Vec<SymbolId>,
    pub notional_closed: Decimal,
    pub margin_before: Decimal,
    pub reward: Decimal,
    pub pool_residual: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationResult {
    pub source: PoolId,
    pub target: PoolId,
    pub collateral: Vec<(BTokenId, Decimal)>,
    pub lp_positions: usize,
    pub margin_accounts: usize,
}

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Normal outcome under adversarial use: undercollateralized or not liquidatable.
    Expected,
    /// Request refused by a pool rule; retrying later may succeed.
    Rejected,
    /// Caller bug: bad ids, amounts, authority, or wrong lifecycle step.
    Misuse,
    /// A collaborator failed during the quote phase.
    Infrastructure,
    /// Ledger accounting would break; never expected.
    Invariant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("invalid {what}: {value}")]
    InvalidAmount { what: &'static str, value: Decimal },

    #[error("insufficient shares in {b_token_id}: requested {requested}, available {available}")]
    InsufficientShares {
        b_token_id: BTokenId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Decimal, available: Decimal },

    #[error("{0} does not exist")]
    InvalidSymbolId(SymbolId),

    #[error("{0} does not exist")]
    InvalidBTokenId(BTokenId),

    #[error("{symbol_id} still has {holders} position holders")]
    PositionHoldersExist { symbol_id: SymbolId, holders: u32 },

    #[error("{symbol_id} is close-only: volume {volume} cannot grow by {delta}")]
    CloseOnlyViolation {
        symbol_id: SymbolId,
        volume: SignedSize,
        delta: Decimal,
    },

    #[error("{account} is not liquidatable (margin ratio {margin_ratio:?})")]
    NotLiquidatable {
        account: AccountId,
        margin_ratio: Option<Decimal>,
    },

    #[error("unauthorized {action}: {reason}")]
    Unauthorized {
        action: &'static str,
        reason: &'static str,
    },

    #[error("migration not ready at {now} (ready at {ready_at:?})")]
    MigrationNotReady {
        ready_at: Option<Timestamp>,
        now: Timestamp,
    },

    #[error("pool already migrated")]
    AlreadyMigrated,

    #[error("pool margin too low: required {required}, available {available}")]
    InsufficientPoolMargin { required: Decimal, available: Decimal },

    #[error("base collateral ratio {ratio} below minimum {minimum}")]
    BaseCollateralRatioTooLow { ratio: Decimal, minimum: Decimal },

    #[error("migration target {0:?} already holds ledger state")]
    MigrationTargetNotEmpty(PoolId),

    #[error("collateral not conserved for {b_token_id}: before {before}, after {after}")]
    ConservationViolated {
        b_token_id: BTokenId,
        before: Decimal,
        after: Decimal,
    },

    #[error("vault shortfall in {b_token_id}: requested {requested}, available {available}")]
    VaultShortfall {
        b_token_id: BTokenId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl PoolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PoolError::InsufficientMargin { .. } | PoolError::NotLiquidatable { .. } => ErrorClass::Expected,

            PoolError::InsufficientShares { .. }
            | PoolError::PositionHoldersExist { .. }
            | PoolError::CloseOnlyViolation { .. }
            | PoolError::MigrationNotReady { .. }
            | PoolError::InsufficientPoolMargin { .. }
            | PoolError::BaseCollateralRatioTooLow { .. } => ErrorClass::Rejected,

            PoolError::InvalidAmount { .. }
            | PoolError::InvalidSymbolId(_)
            | PoolError::InvalidBTokenId(_)
            | PoolError::Unauthorized { .. }
            | PoolError::AlreadyMigrated
            | PoolError::MigrationTargetNotEmpty(_)
            | PoolError::Config(_) => ErrorClass::Misuse,

            PoolError::Collaborator(_) => ErrorClass::Infrastructure,

            PoolError::ConservationViolated { .. } | PoolError::VaultShortfall { .. } => ErrorClass::Invariant,
        }
    }

    pub fn is_expected(&self) -> bool {
        self.class() == ErrorClass::Expected
    }
}
