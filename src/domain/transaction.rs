//! Immutable ledger transactions and withdrawal requests.

use crate::domain::{Decimal, MachineId, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of balance movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Debit: capital committed to a machine.
    Purchase,
    /// Credit: reward claimed from a machine.
    Claim,
    /// Credit: confirmed external payment.
    Deposit,
    /// Debit: requested payout.
    Withdrawal,
    /// Credit: referrer's share of a referee's purchase.
    ReferralBonus,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Claim => "claim",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::ReferralBonus => "referral_bonus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(TransactionKind::Purchase),
            "claim" => Some(TransactionKind::Claim),
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            "referral_bonus" => Some(TransactionKind::ReferralBonus),
            _ => None,
        }
    }

    /// True for kinds that increase the balance.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Claim | TransactionKind::Deposit | TransactionKind::ReferralBonus
        )
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger entry. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Always non-negative; `kind` carries the direction.
    pub amount: Decimal,
    /// External payment id for deposits; the idempotency key for callbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Machine involved, for purchases and claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<MachineId>,
    pub created_at: TimeMs,
}

impl Transaction {
    pub fn new(
        user_id: UserId,
        kind: TransactionKind,
        amount: Decimal,
        payment_id: Option<String>,
        machine_id: Option<MachineId>,
        now: TimeMs,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            kind,
            amount,
            payment_id,
            machine_id,
            created_at: now,
        }
    }
}

/// Status of a withdrawal request. Created as `Pending`; later transitions
/// are administrative actions outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "approved" => Some(WithdrawalStatus::Approved),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }
}

/// A payout request. The debit happens at request time; settlement to the
/// destination address is out of scope here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: UserId,
    pub amount: Decimal,
    /// Destination address as given by the user; not validated on-chain.
    pub address: String,
    pub status: WithdrawalStatus,
    pub created_at: TimeMs,
}

impl Withdrawal {
    pub fn new(user_id: UserId, amount: Decimal, address: String, now: TimeMs) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            amount,
            address,
            status: WithdrawalStatus::Pending,
            created_at: now,
        }
    }
}
