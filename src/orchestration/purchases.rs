//! Purchase orchestration: template lookup, ledger debit, machine creation,
//! referral bonus credit.

use crate::db::Repository;
use crate::domain::{
    Decimal, Machine, TimeMs, Transaction, TransactionKind, User, UserId,
};
use crate::engine::ledger::{self, LedgerError};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct PurchaseService {
    repo: Arc<Repository>,
    earnings_cap_multiplier: Decimal,
    referral_bonus_percent: Decimal,
}

/// The result of a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub machine: Machine,
    pub new_balance: Decimal,
}

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("user not found")]
    UserNotFound,
    #[error("machine template not found")]
    TemplateNotFound,
    #[error("machine template is not purchasable")]
    TemplateInactive,
    #[error("purchase lost a concurrent update race, retry")]
    Conflict,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl PurchaseService {
    pub fn new(
        repo: Arc<Repository>,
        earnings_cap_multiplier: Decimal,
        referral_bonus_percent: Decimal,
    ) -> Self {
        Self {
            repo,
            earnings_cap_multiplier,
            referral_bonus_percent,
        }
    }

    /// Purchase a machine from a template.
    ///
    /// Debit, machine insert, and the ledger record commit in one storage
    /// transaction; the debit is guarded by a balance compare-and-swap so
    /// two concurrent purchases can never both pass the sufficiency check
    /// against a stale balance. The referrer's bonus is credited after the
    /// purchase commits; a bonus that cannot be applied is logged and
    /// dropped, never unwinding the purchase.
    pub async fn purchase(
        &self,
        user_id: &UserId,
        template_id: &str,
        now: TimeMs,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let template = self
            .repo
            .get_template(template_id)
            .await?
            .ok_or(PurchaseError::TemplateNotFound)?;
        if !template.is_active {
            return Err(PurchaseError::TemplateInactive);
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let user = self
                .repo
                .get_user(user_id)
                .await?
                .ok_or(PurchaseError::UserNotFound)?;

            let debited =
                ledger::apply_delta(&user, template.investment_amount, TransactionKind::Purchase)?;

            let machine = Machine::from_template(
                user_id.clone(),
                &template,
                self.earnings_cap_multiplier,
                now,
            );
            let record = Transaction::new(
                user_id.clone(),
                TransactionKind::Purchase,
                template.investment_amount,
                None,
                Some(machine.id.clone()),
                now,
            );

            let committed = self
                .repo
                .commit_purchase(&user, &debited, &machine, &record)
                .await?;

            if committed {
                tracing::info!(
                    user = %user_id,
                    machine = %machine.id,
                    template = template_id,
                    amount = %template.investment_amount,
                    "Machine purchased"
                );
                self.credit_referral_bonus(&user, template.investment_amount, now)
                    .await;
                return Ok(PurchaseReceipt {
                    machine,
                    new_balance: debited.balance,
                });
            }
        }

        Err(PurchaseError::Conflict)
    }

    /// Credit the buyer's referrer their share of this purchase.
    ///
    /// Best-effort by design: the purchase has already committed, so a bonus
    /// that keeps losing its compare-and-swap race is logged and dropped
    /// rather than failing the caller.
    async fn credit_referral_bonus(&self, buyer: &User, investment: Decimal, now: TimeMs) {
        let Some(referrer_id) = buyer.referred_by.as_ref() else {
            return;
        };

        let bonus = investment * self.referral_bonus_percent / Decimal::hundred();
        if !bonus.is_positive() {
            return;
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let result: Result<bool, sqlx::Error> = async {
                let Some(referrer) = self.repo.get_user(referrer_id).await? else {
                    warn!(referrer = %referrer_id, "Referrer vanished, dropping bonus");
                    return Ok(true);
                };
                let Some(edge) = self.repo.get_referral_by_referee(&buyer.id).await? else {
                    warn!(referee = %buyer.id, "Referral edge missing, dropping bonus");
                    return Ok(true);
                };

                let credited = match ledger::apply_delta(
                    &referrer,
                    bonus,
                    TransactionKind::ReferralBonus,
                ) {
                    Ok(user) => user,
                    Err(e) => {
                        warn!(referrer = %referrer_id, error = %e, "Bonus ledger rejection");
                        return Ok(true);
                    }
                };

                let record = Transaction::new(
                    referrer.id.clone(),
                    TransactionKind::ReferralBonus,
                    bonus,
                    None,
                    None,
                    now,
                );

                self.repo
                    .commit_referral_bonus(
                        &referrer,
                        &credited,
                        &edge.id,
                        &edge.bonus_earned,
                        &(edge.bonus_earned + bonus),
                        &record,
                    )
                    .await
            }
            .await;

            match result {
                Ok(true) => return,
                Ok(false) => continue,
                Err(e) => {
                    warn!(referrer = %referrer_id, error = %e, "Referral bonus credit failed");
                    return;
                }
            }
        }

        warn!(
            referrer = %referrer_id,
            referee = %buyer.id,
            bonus = %bonus,
            "Referral bonus dropped after repeated conflicts"
        );
    }
}
