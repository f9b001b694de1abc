//! Claim eligibility evaluation.
//!
//! Pure function of a machine, an effective interval, and a timestamp; no
//! side effects, so the cooldown rules are trivially unit-testable.

use crate::domain::{Machine, TimeMs};

/// The outcome of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    /// Cooldown remaining when time is the blocker; 0 when eligible or when
    /// the machine is blocked for a non-cooldown reason (inactive, ceiling).
    pub remaining_ms: i64,
}

impl Eligibility {
    fn eligible() -> Self {
        Eligibility {
            eligible: true,
            remaining_ms: 0,
        }
    }

    fn blocked(remaining_ms: i64) -> Self {
        Eligibility {
            eligible: false,
            remaining_ms,
        }
    }
}

/// Decide whether `machine` can be claimed at `now`.
///
/// `effective_interval_ms` is the machine's own interval after the owner's
/// referral tier has been applied (see `engine::referral_tier`). Eligible iff
/// the machine is active, below its earnings ceiling, and either never
/// claimed or past the cooldown.
pub fn evaluate(machine: &Machine, effective_interval_ms: i64, now: TimeMs) -> Eligibility {
    if !machine.is_active || machine.is_maxed() {
        return Eligibility::blocked(0);
    }

    if machine.never_claimed() {
        return Eligibility::eligible();
    }

    let elapsed = now.since(machine.last_claimed_at);
    if elapsed >= effective_interval_ms {
        Eligibility::eligible()
    } else {
        Eligibility::blocked((effective_interval_ms - elapsed).max(0))
    }
}
