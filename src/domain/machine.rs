//! Machine record: a purchased investment unit, and the template catalog
//! it is purchased from.

use crate::domain::{Decimal, MachineId, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// A purchased machine.
///
/// Invariants: `0 <= current_earnings <= max_earnings`; a claim is eligible
/// only when the cooldown has elapsed (or the machine was never claimed).
/// The machine becomes terminally inactive once `current_earnings` reaches
/// `max_earnings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub user_id: UserId,
    /// Template this machine was purchased from, if any.
    pub template_id: Option<String>,
    pub name: String,
    /// Capital committed at purchase.
    pub investment_amount: Decimal,
    /// Amount credited per successful claim.
    pub reward_amount: Decimal,
    /// Cooldown between claims. The referral tier scales this at evaluation
    /// time; nothing tier-related is stored here.
    pub claim_interval_ms: i64,
    /// 0 means never claimed.
    pub last_claimed_at: TimeMs,
    /// Cumulative credited rewards.
    pub current_earnings: Decimal,
    /// Earnings ceiling, a multiple of `investment_amount`.
    pub max_earnings: Decimal,
    pub is_active: bool,
    pub purchased_at: TimeMs,
}

impl Machine {
    /// Build a machine from a template at purchase time.
    pub fn from_template(
        user_id: UserId,
        template: &MachineTemplate,
        earnings_cap_multiplier: Decimal,
        now: TimeMs,
    ) -> Self {
        Self {
            id: MachineId::generate(),
            user_id,
            template_id: Some(template.id.clone()),
            name: template.name.clone(),
            investment_amount: template.investment_amount,
            reward_amount: template.reward_amount,
            claim_interval_ms: template.claim_interval_ms,
            last_claimed_at: TimeMs::new(0),
            current_earnings: Decimal::zero(),
            max_earnings: template.investment_amount * earnings_cap_multiplier,
            is_active: true,
            purchased_at: now,
        }
    }

    /// True if this machine has never had a successful claim.
    pub fn never_claimed(&self) -> bool {
        self.last_claimed_at.as_ms() == 0
    }

    /// True once earnings have reached the ceiling.
    pub fn is_maxed(&self) -> bool {
        self.current_earnings >= self.max_earnings
    }

    /// Remaining earnings capacity before the ceiling.
    pub fn headroom(&self) -> Decimal {
        if self.is_maxed() {
            Decimal::zero()
        } else {
            self.max_earnings - self.current_earnings
        }
    }
}

/// A purchasable machine configuration managed by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTemplate {
    pub id: String,
    pub name: String,
    pub investment_amount: Decimal,
    pub reward_amount: Decimal,
    pub claim_interval_ms: i64,
    pub is_active: bool,
}
