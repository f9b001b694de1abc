//! Balance ledger: the single choke point for user balance changes.
//!
//! Every purchase, claim, deposit, withdrawal, and referral bonus computes
//! its new user state here; nothing else may touch `balance`,
//! `total_invested`, or `total_earned`. The repository then commits the
//! result with a compare-and-swap against the previously-read values, so a
//! stale read can never overdraw.

use crate::domain::{Decimal, TransactionKind, User};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("ledger amounts must be non-negative, got {0}")]
    NegativeAmount(Decimal),
}

/// Apply a balance movement of `amount` (always non-negative; `kind` carries
/// the direction) and return the updated user. The input is untouched —
/// callers keep it as the compare-and-swap baseline.
pub fn apply_delta(user: &User, amount: Decimal, kind: TransactionKind) -> Result<User, LedgerError> {
    if amount.is_negative() {
        return Err(LedgerError::NegativeAmount(amount));
    }

    let mut updated = user.clone();
    match kind {
        TransactionKind::Purchase => {
            if amount > user.balance {
                return Err(LedgerError::InsufficientBalance {
                    available: user.balance,
                    requested: amount,
                });
            }
            updated.balance = user.balance - amount;
            updated.total_invested = user.total_invested + amount;
        }
        TransactionKind::Withdrawal => {
            if amount > user.balance {
                return Err(LedgerError::InsufficientBalance {
                    available: user.balance,
                    requested: amount,
                });
            }
            updated.balance = user.balance - amount;
        }
        TransactionKind::Deposit => {
            updated.balance = user.balance + amount;
        }
        TransactionKind::Claim | TransactionKind::ReferralBonus => {
            updated.balance = user.balance + amount;
            updated.total_earned = user.total_earned + amount;
        }
    }

    Ok(updated)
}
