//! Canonical domain records.
//!
//! One authoritative shape per entity; every surface (API, engine, storage)
//! works against these rather than re-deriving its own.

pub mod decimal;
pub mod machine;
pub mod primitives;
pub mod referral;
pub mod transaction;
pub mod user;

pub use decimal::Decimal;
pub use machine::{Machine, MachineTemplate};
pub use primitives::{MachineId, TimeMs, UserId};
pub use referral::ReferralEdge;
pub use transaction::{Transaction, TransactionKind, Withdrawal, WithdrawalStatus};
pub use user::User;
