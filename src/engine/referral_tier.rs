//! Referral tier resolution.
//!
//! A user's referral count maps to a claim-interval multiplier. The tier is
//! applied to a machine's own interval at evaluation time; it is never
//! stored on the machine.

use crate::domain::Decimal;
use rust_decimal::Decimal as RustDecimal;

/// A resolved referral tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralTier {
    pub claim_interval_multiplier: Decimal,
    pub label: &'static str,
}

/// Map a referral count to its tier.
///
/// 3+ referrals halve the interval, 1-2 scale it to 0.8, otherwise baseline.
pub fn tier_for(referral_count: i64) -> ReferralTier {
    if referral_count >= 3 {
        ReferralTier {
            claim_interval_multiplier: Decimal::new(RustDecimal::new(5, 1)),
            label: "accelerated",
        }
    } else if referral_count >= 1 {
        ReferralTier {
            claim_interval_multiplier: Decimal::new(RustDecimal::new(8, 1)),
            label: "boosted",
        }
    } else {
        ReferralTier {
            claim_interval_multiplier: Decimal::from_i64(1),
            label: "standard",
        }
    }
}

/// Scale a machine's interval by the owner's tier, truncating to whole ms.
pub fn effective_interval_ms(base_interval_ms: i64, tier: &ReferralTier) -> i64 {
    let scaled = Decimal::from_i64(base_interval_ms) * tier.claim_interval_multiplier;
    scaled.to_i64().unwrap_or(base_interval_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_referrals_is_baseline() {
        let tier = tier_for(0);
        assert_eq!(tier.label, "standard");
        assert_eq!(tier.claim_interval_multiplier.to_canonical_string(), "1");
        assert_eq!(effective_interval_ms(600_000, &tier), 600_000);
    }

    #[test]
    fn one_referral_scales_to_eight_tenths() {
        let tier = tier_for(1);
        assert_eq!(tier.label, "boosted");
        // 10-minute baseline becomes 8-minute claims.
        assert_eq!(effective_interval_ms(600_000, &tier), 480_000);
    }

    #[test]
    fn two_referrals_stay_in_the_boosted_tier() {
        assert_eq!(tier_for(2).label, "boosted");
    }

    #[test]
    fn three_referrals_halve_the_interval() {
        let tier = tier_for(3);
        assert_eq!(tier.label, "accelerated");
        // 10-minute baseline becomes 5-minute claims.
        assert_eq!(effective_interval_ms(600_000, &tier), 300_000);
    }

    #[test]
    fn many_referrals_do_not_stack_further() {
        assert_eq!(tier_for(50), tier_for(3));
    }

    #[test]
    fn odd_intervals_truncate_to_whole_ms() {
        let tier = tier_for(3);
        assert_eq!(effective_interval_ms(5, &tier), 2);
    }
}
