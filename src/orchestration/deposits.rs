//! Deposit-callback orchestration.
//!
//! The checkout provider redirects/retries callbacks at-least-once; the
//! payment id is the idempotency key, and duplicate delivery must resolve to
//! a success-no-op so the provider stops retrying.

use crate::db::{DepositCommit, Repository};
use crate::domain::{Decimal, TimeMs, Transaction, TransactionKind};
use crate::engine::ledger::{self, LedgerError};
use crate::gateway::{GatewayError, PaymentGateway, PaymentStatus};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct DepositService {
    repo: Arc<Repository>,
    gateway: Arc<dyn PaymentGateway>,
}

/// A deposit callback as delivered by the checkout provider.
#[derive(Debug, Clone)]
pub struct DepositCallback {
    pub payment_id: String,
    pub email: String,
    pub amount: Decimal,
    pub status: String,
}

/// How a callback was resolved. All three are successes from the provider's
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    /// Balance credited and transaction recorded.
    Credited { new_balance: Decimal },
    /// This payment id was already recorded; nothing changed.
    AlreadyProcessed,
    /// Callback acknowledged without credit (not a completed payment).
    Ignored { reason: String },
}

#[derive(Debug, Error)]
pub enum DepositError {
    #[error("no user registered for email {0}")]
    UnknownUser(String),
    #[error("deposit amount must be positive")]
    InvalidAmount,
    #[error("callback amount {reported} does not match gateway record {verified}")]
    AmountMismatch {
        reported: Decimal,
        verified: Decimal,
    },
    #[error("deposit lost a concurrent update race, retry")]
    Conflict,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl DepositService {
    pub fn new(repo: Arc<Repository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { repo, gateway }
    }

    /// Process one callback delivery.
    ///
    /// Verifies the payment against the gateway, resolves the user by email,
    /// and commits transaction + credit atomically. Safe to call any number
    /// of times with the same payment id.
    pub async fn process_callback(
        &self,
        callback: &DepositCallback,
        now: TimeMs,
    ) -> Result<DepositOutcome, DepositError> {
        if !callback.amount.is_positive() {
            return Err(DepositError::InvalidAmount);
        }

        let Some(reported_status) = PaymentStatus::parse(&callback.status) else {
            return Ok(DepositOutcome::Ignored {
                reason: format!("unrecognized status {}", callback.status),
            });
        };
        if reported_status != PaymentStatus::Completed {
            return Ok(DepositOutcome::Ignored {
                reason: format!("payment status {}", callback.status),
            });
        }

        let verification = self.gateway.verify_payment(&callback.payment_id).await?;
        if verification.status != PaymentStatus::Completed {
            return Ok(DepositOutcome::Ignored {
                reason: "gateway does not report the payment as completed".to_string(),
            });
        }
        if verification.amount != callback.amount {
            return Err(DepositError::AmountMismatch {
                reported: callback.amount,
                verified: verification.amount,
            });
        }

        let user = self
            .repo
            .get_user_by_email(&callback.email)
            .await?
            .ok_or_else(|| DepositError::UnknownUser(callback.email.clone()))?;

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let user = self
                .repo
                .get_user(&user.id)
                .await?
                .ok_or_else(|| DepositError::UnknownUser(callback.email.clone()))?;

            let credited = ledger::apply_delta(&user, callback.amount, TransactionKind::Deposit)?;
            let record = Transaction::new(
                user.id.clone(),
                TransactionKind::Deposit,
                callback.amount,
                Some(callback.payment_id.clone()),
                None,
                now,
            );

            match self.repo.commit_deposit(&record, &user, &credited).await? {
                DepositCommit::Credited => {
                    info!(
                        user = %user.id,
                        payment = %callback.payment_id,
                        amount = %callback.amount,
                        "Deposit credited"
                    );
                    return Ok(DepositOutcome::Credited {
                        new_balance: credited.balance,
                    });
                }
                DepositCommit::AlreadyProcessed => {
                    info!(
                        payment = %callback.payment_id,
                        "Duplicate deposit callback acknowledged"
                    );
                    return Ok(DepositOutcome::AlreadyProcessed);
                }
                DepositCommit::Conflict => continue,
            }
        }

        Err(DepositError::Conflict)
    }
}
