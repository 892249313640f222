// 14.0 migration.rs: timelocked handover of a pool's whole ledger to a successor.
// None -> Proposed -> Approved -> Executed. re-proposing while Proposed replaces the
// proposal; nothing ever moves backwards. Approved and Executed freeze the pool.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::PoolError;
use crate::types::{BTokenId, PoolId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    #[default]
    None,
    Proposed { target: PoolId, ready_at: Timestamp },
    Approved { target: PoolId },
    Executed { target: PoolId },
}

impl MigrationState {
    /// Every mutating operation is refused once approved.
    pub fn is_frozen(&self) -> bool {
        matches!(self, MigrationState::Approved { .. } | MigrationState::Executed { .. })
    }

    pub fn target(&self) -> Option<PoolId> {
        match *self {
            MigrationState::None => None,
            MigrationState::Proposed { target, .. }
            | MigrationState::Approved { target }
            | MigrationState::Executed { target } => Some(target),
        }
    }

    pub fn propose(&self, target: PoolId, ready_at: Timestamp) -> Result<MigrationState, PoolError> {
        match self {
            MigrationState::None | MigrationState::Proposed { .. } => {
                Ok(MigrationState::Proposed { target, ready_at })
            }
            MigrationState::Approved { .. } => Err(PoolError::Unauthorized {
                action: "prepare_migration",
                reason: "migration already approved",
            }),
            MigrationState::Executed { .. } => Err(PoolError::AlreadyMigrated),
        }
    }

    pub fn approve(&self, now: Timestamp) -> Result<MigrationState, PoolError> {
        match *self {
            MigrationState::Proposed { target, ready_at } if now >= ready_at => {
                Ok(MigrationState::Approved { target })
            }
            MigrationState::Proposed { ready_at, .. } => Err(PoolError::MigrationNotReady {
                ready_at: Some(ready_at),
                now,
            }),
            MigrationState::None => Err(PoolError::MigrationNotReady { ready_at: None, now }),
            MigrationState::Approved { .. } => Err(PoolError::Unauthorized {
                action: "approve_migration",
                reason: "migration already approved",
            }),
            MigrationState::Executed { .. } => Err(PoolError::AlreadyMigrated),
        }
    }

    /// Source-side transition, checked from the target's point of view.
    pub fn execute(&self, target: PoolId, now: Timestamp) -> Result<MigrationState, PoolError> {
        match *self {
            MigrationState::Approved { target: approved } if approved == target => {
                Ok(MigrationState::Executed { target })
            }
            MigrationState::Executed { .. } => Err(PoolError::AlreadyMigrated),
            MigrationState::Proposed { ready_at, .. } => Err(PoolError::MigrationNotReady {
                ready_at: Some(ready_at),
                now,
            }),
            MigrationState::None | MigrationState::Approved { .. } => {
                Err(PoolError::MigrationNotReady { ready_at: None, now })
            }
        }
    }
}

pub type CollateralSnapshot = BTreeMap<BTokenId, Decimal>;

/// Per-bToken: source before + target before == target after.
pub fn verify_conservation(
    source_before: &CollateralSnapshot,
    target_before: &CollateralSnapshot,
    target_after: &CollateralSnapshot,
) -> Result<(), PoolError> {
    let mut expected = source_before.clone();
    for (b_token_id, amount) in target_before {
        *expected.entry(*b_token_id).or_insert(Decimal::ZERO) += *amount;
    }

    for (b_token_id, before) in &expected {
        let after = target_after.get(b_token_id).copied().unwrap_or(Decimal::ZERO);
        if after != *before {
            return Err(PoolError::ConservationViolated {
                b_token_id: *b_token_id,
                before: *before,
                after,
            });
        }
    }
    // nothing may appear out of thin air either
    for (b_token_id, after) in target_after {
        if !expected.contains_key(b_token_id) && !after.is_zero() {
            return Err(PoolError::ConservationViolated {
                b_token_id: *b_token_id,
                before: Decimal::ZERO,
                after: *after,
            });
        }
    }
    Ok(())
}
