//! Reward settlement for a successful claim.
//!
//! Pure computation: given a machine that passed eligibility, produce the
//! credited amount and the updated machine. The storage layer commits the
//! result with a compare-and-swap so concurrent claims cannot both win.

use crate::domain::{Decimal, Machine, TimeMs};

/// The computed result of settling one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Amount credited to the owner. Clamped to the machine's remaining
    /// headroom, so the final claim may credit less than `reward_amount`.
    pub credited: Decimal,
    /// The machine with earnings, claim timestamp, and active flag updated.
    pub machine: Machine,
}

/// Settle a claim against `machine` at `now`.
///
/// Callers must have established eligibility first (`eligibility::evaluate`).
/// The credited amount is `min(reward_amount, headroom)`; when the ceiling is
/// reached the machine is deactivated.
pub fn settle(machine: &Machine, now: TimeMs) -> Settlement {
    let credited = machine.reward_amount.min(machine.headroom());

    let mut updated = machine.clone();
    updated.current_earnings = machine.current_earnings + credited;
    updated.last_claimed_at = now;
    if updated.is_maxed() {
        updated.is_active = false;
    }

    Settlement {
        credited,
        machine: updated,
    }
}
