pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, DepositCommit, Repository};
pub use domain::{
    Decimal, Machine, MachineId, MachineTemplate, ReferralEdge, TimeMs, Transaction,
    TransactionKind, User, UserId, Withdrawal, WithdrawalStatus,
};
pub use error::AppError;
pub use gateway::{CpayGateway, GatewayError, MockGateway, PaymentGateway, PaymentStatus};
