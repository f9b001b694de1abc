//! Pure, deterministic domain logic: eligibility, accrual, tiers,
//! aggregation, and the balance ledger.
//!
//! Nothing here performs I/O; the orchestration layer wires these functions
//! to the repository's atomic commit primitives.

pub mod accrual;
pub mod eligibility;
pub mod ledger;
pub mod portfolio;
pub mod referral_tier;

pub use accrual::{settle, Settlement};
pub use eligibility::{evaluate, Eligibility};
pub use ledger::{apply_delta, LedgerError};
pub use portfolio::{aggregate, PortfolioSummary, DAY_MS};
pub use referral_tier::{effective_interval_ms, tier_for, ReferralTier};
