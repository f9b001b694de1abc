//! Orchestration services wiring the pure engine to the repository's atomic
//! commit primitives.

pub mod claims;
pub mod deposits;
pub mod purchases;
pub mod withdrawals;

pub use claims::{ClaimError, ClaimReceipt, ClaimService};
pub use deposits::{DepositCallback, DepositError, DepositOutcome, DepositService};
pub use purchases::{PurchaseError, PurchaseReceipt, PurchaseService};
pub use withdrawals::{WithdrawalError, WithdrawalReceipt, WithdrawalService};
