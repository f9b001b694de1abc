//! Referral edge between a referrer and a referee.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single referral relationship.
///
/// A user has at most one inbound edge (enforced with a UNIQUE constraint on
/// the referee), created when the referee redeems the referrer's code at
/// registration. After creation only `bonus_earned` accrues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEdge {
    pub id: String,
    pub referrer_id: UserId,
    pub referee_id: UserId,
    /// Cumulative bonus credited to the referrer from this referee's activity.
    pub bonus_earned: Decimal,
    pub created_at: TimeMs,
}

impl ReferralEdge {
    /// Create a fresh edge with no bonus accrued yet.
    pub fn new(referrer_id: UserId, referee_id: UserId, now: TimeMs) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            referrer_id,
            referee_id,
            bonus_earned: Decimal::zero(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_edge_starts_with_zero_bonus() {
        let edge = ReferralEdge::new(
            UserId::new("u-referrer".to_string()),
            UserId::new("u-referee".to_string()),
            TimeMs::new(1000),
        );
        assert!(edge.bonus_earned.is_zero());
        assert_eq!(edge.referrer_id.as_str(), "u-referrer");
        assert_eq!(edge.referee_id.as_str(), "u-referee");
    }
}
