//! Withdrawal-request orchestration.

use crate::db::Repository;
use crate::domain::{Decimal, TimeMs, Transaction, TransactionKind, UserId, Withdrawal};
use crate::engine::ledger::{self, LedgerError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct WithdrawalService {
    repo: Arc<Repository>,
}

/// The result of a successful withdrawal request.
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    pub withdrawal: Withdrawal,
    pub new_balance: Decimal,
}

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("user not found")]
    UserNotFound,
    #[error("withdrawal amount must be positive")]
    InvalidAmount,
    #[error("withdrawal lost a concurrent update race, retry")]
    Conflict,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl WithdrawalService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Debit the balance and record a pending withdrawal.
    ///
    /// The debit is guarded by a balance compare-and-swap; an overdraft is
    /// rejected with the balance untouched.
    pub async fn request(
        &self,
        user_id: &UserId,
        amount: Decimal,
        address: String,
        now: TimeMs,
    ) -> Result<WithdrawalReceipt, WithdrawalError> {
        if !amount.is_positive() {
            return Err(WithdrawalError::InvalidAmount);
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let user = self
                .repo
                .get_user(user_id)
                .await?
                .ok_or(WithdrawalError::UserNotFound)?;

            let debited = ledger::apply_delta(&user, amount, TransactionKind::Withdrawal)?;

            let withdrawal = Withdrawal::new(user_id.clone(), amount, address.clone(), now);
            let record = Transaction::new(
                user_id.clone(),
                TransactionKind::Withdrawal,
                amount,
                None,
                None,
                now,
            );

            let committed = self
                .repo
                .commit_withdrawal(&user, &debited, &withdrawal, &record)
                .await?;

            if committed {
                info!(
                    user = %user_id,
                    amount = %amount,
                    withdrawal = %withdrawal.id,
                    "Withdrawal requested"
                );
                return Ok(WithdrawalReceipt {
                    withdrawal,
                    new_balance: debited.balance,
                });
            }
        }

        Err(WithdrawalError::Conflict)
    }
}
