//! Read-only portfolio aggregation across a user's machines.

use crate::domain::{Decimal, Machine};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Derived display metrics for a set of machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioSummary {
    /// Σ reward * (24h / interval) over active machines.
    pub daily_potential: Decimal,
    pub weekly_potential: Decimal,
    pub monthly_potential: Decimal,
    pub total_invested: Decimal,
    pub total_current_earnings: Decimal,
    /// earnings / invested * 100; 0 when nothing is invested.
    pub roi_percent: Decimal,
    pub active_machines: usize,
}

/// Aggregate projections over `machines`. Pure and read-only.
///
/// Every ratio here guards its denominator; a user with no machines (or a
/// machine with a zero interval) must aggregate to zeros, not a fault.
pub fn aggregate(machines: &[Machine]) -> PortfolioSummary {
    let mut daily_potential = Decimal::zero();
    let mut total_invested = Decimal::zero();
    let mut total_current_earnings = Decimal::zero();
    let mut active_machines = 0;

    for machine in machines {
        total_invested = total_invested + machine.investment_amount;
        total_current_earnings = total_current_earnings + machine.current_earnings;

        if machine.is_active && machine.claim_interval_ms > 0 {
            let claims_per_day =
                Decimal::from_i64(DAY_MS) / Decimal::from_i64(machine.claim_interval_ms);
            daily_potential = daily_potential + machine.reward_amount * claims_per_day;
            active_machines += 1;
        }
    }

    let roi_percent = if total_invested.is_zero() {
        Decimal::zero()
    } else {
        total_current_earnings / total_invested * Decimal::hundred()
    };

    PortfolioSummary {
        daily_potential,
        weekly_potential: daily_potential * Decimal::from_i64(7),
        monthly_potential: daily_potential * Decimal::from_i64(30),
        total_invested,
        total_current_earnings,
        roi_percent,
        active_machines,
    }
}
