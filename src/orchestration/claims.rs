//! Claim orchestration: eligibility check, settlement, atomic commit.

use crate::db::Repository;
use crate::domain::{Decimal, Machine, MachineId, TimeMs, Transaction, TransactionKind, UserId};
use crate::engine::ledger::LedgerError;
use crate::engine::{accrual, eligibility, ledger, referral_tier};
use std::sync::Arc;
use thiserror::Error;

/// Commit attempts before giving up on a contended record. Each retry
/// re-reads and re-evaluates, so a lost race normally resolves to
/// `NotEligible` on the next pass rather than exhausting this.
const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct ClaimService {
    repo: Arc<Repository>,
}

/// The result of a successful claim.
#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub credited: Decimal,
    pub machine: Machine,
    pub new_balance: Decimal,
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("machine is not eligible for claim, {remaining_ms}ms remaining")]
    NotEligible { remaining_ms: i64 },
    #[error("machine not found")]
    MachineNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("machine does not belong to user")]
    UserMismatch,
    #[error("claim lost a concurrent update race, retry")]
    Conflict,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl ClaimService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Claim a machine's reward for its owner.
    ///
    /// The read-check-write sequence is committed with compare-and-swap
    /// updates on both the machine and the owner; when a concurrent claim
    /// wins, the fresh re-read reports `NotEligible` with the new cooldown
    /// instead of a generic failure.
    pub async fn claim(
        &self,
        user_id: &UserId,
        machine_id: &MachineId,
        now: TimeMs,
    ) -> Result<ClaimReceipt, ClaimError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let machine = self
                .repo
                .get_machine(machine_id)
                .await?
                .ok_or(ClaimError::MachineNotFound)?;

            if machine.user_id != *user_id {
                return Err(ClaimError::UserMismatch);
            }

            let user = self
                .repo
                .get_user(user_id)
                .await?
                .ok_or(ClaimError::UserNotFound)?;

            let referral_count = self.repo.count_referrals(user_id).await?;
            let tier = referral_tier::tier_for(referral_count);
            let effective_interval =
                referral_tier::effective_interval_ms(machine.claim_interval_ms, &tier);

            let check = eligibility::evaluate(&machine, effective_interval, now);
            if !check.eligible {
                return Err(ClaimError::NotEligible {
                    remaining_ms: check.remaining_ms,
                });
            }

            let settlement = accrual::settle(&machine, now);
            let credited_user =
                ledger::apply_delta(&user, settlement.credited, TransactionKind::Claim)?;

            let record = Transaction::new(
                user_id.clone(),
                TransactionKind::Claim,
                settlement.credited,
                None,
                Some(machine_id.clone()),
                now,
            );

            let committed = self
                .repo
                .commit_claim(&machine, &settlement.machine, &user, &credited_user, &record)
                .await?;

            if committed {
                tracing::info!(
                    user = %user_id,
                    machine = %machine_id,
                    credited = %settlement.credited,
                    "Claim settled"
                );
                return Ok(ClaimReceipt {
                    credited: settlement.credited,
                    machine: settlement.machine,
                    new_balance: credited_user.balance,
                });
            }
            // Lost the race; loop re-reads and re-evaluates.
        }

        Err(ClaimError::Conflict)
    }
}
