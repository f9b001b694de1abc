//! User account with its financial state.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// A platform user.
///
/// `balance` is spendable funds; `total_invested` and `total_earned` are
/// lifetime counters. Invariant: `balance >= 0` at all times — every
/// mutation goes through the ledger (`engine::ledger`), never ad hoc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    /// Spendable funds.
    pub balance: Decimal,
    /// Lifetime capital committed to machine purchases.
    pub total_invested: Decimal,
    /// Lifetime claimed rewards (including referral bonuses).
    pub total_earned: Decimal,
    /// Code other users redeem to become this user's referees.
    pub referral_code: String,
    /// Referrer, set at most once, at registration.
    pub referred_by: Option<UserId>,
    pub created_at: TimeMs,
}

impl User {
    /// Create a new user with zero balances and a derived referral code.
    pub fn register(
        email: String,
        username: String,
        referred_by: Option<UserId>,
        now: TimeMs,
    ) -> Self {
        let id = UserId::generate();
        let referral_code = derive_referral_code(&id, &email);
        Self {
            id,
            email,
            username,
            balance: Decimal::zero(),
            total_invested: Decimal::zero(),
            total_earned: Decimal::zero(),
            referral_code,
            referred_by,
            created_at: now,
        }
    }
}

/// Derive a short, stable referral code from the user's identity.
///
/// First 8 hex chars of SHA-256 over (id, email), length-prefixed so field
/// boundaries cannot collide.
pub fn derive_referral_code(id: &UserId, email: &str) -> String {
    use sha2::{Digest, Sha256};

    fn hash_var(hasher: &mut Sha256, data: &str) {
        hasher.update((data.len() as u32).to_le_bytes());
        hasher.update(data.as_bytes());
    }

    let mut hasher = Sha256::new();
    hash_var(&mut hasher, id.as_str());
    hash_var(&mut hasher, email);

    let hash = hasher.finalize();
    hex::encode(&hash[..4])
}
