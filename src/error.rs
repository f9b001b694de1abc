use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::LedgerError;
use crate::gateway::GatewayError;
use crate::orchestration::claims::ClaimError;
use crate::orchestration::deposits::DepositError;
use crate::orchestration::purchases::PurchaseError;
use crate::orchestration::withdrawals::WithdrawalError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ClaimError> for AppError {
    fn from(err: ClaimError) -> Self {
        match &err {
            ClaimError::NotEligible { .. } | ClaimError::Conflict => {
                AppError::Conflict(err.to_string())
            }
            ClaimError::MachineNotFound | ClaimError::UserNotFound => {
                AppError::NotFound(err.to_string())
            }
            ClaimError::UserMismatch => AppError::BadRequest(err.to_string()),
            ClaimError::Ledger(LedgerError::InsufficientBalance { .. }) => {
                AppError::Conflict(err.to_string())
            }
            ClaimError::Ledger(LedgerError::NegativeAmount(_)) => {
                AppError::Internal(err.to_string())
            }
            ClaimError::Db(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<PurchaseError> for AppError {
    fn from(err: PurchaseError) -> Self {
        match &err {
            PurchaseError::UserNotFound | PurchaseError::TemplateNotFound => {
                AppError::NotFound(err.to_string())
            }
            PurchaseError::TemplateInactive => AppError::BadRequest(err.to_string()),
            PurchaseError::Ledger(LedgerError::InsufficientBalance { .. })
            | PurchaseError::Conflict => AppError::Conflict(err.to_string()),
            PurchaseError::Ledger(LedgerError::NegativeAmount(_)) => {
                AppError::BadRequest(err.to_string())
            }
            PurchaseError::Db(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<DepositError> for AppError {
    fn from(err: DepositError) -> Self {
        match &err {
            DepositError::UnknownUser(_) => AppError::NotFound(err.to_string()),
            DepositError::InvalidAmount | DepositError::AmountMismatch { .. } => {
                AppError::BadRequest(err.to_string())
            }
            DepositError::Gateway(GatewayError::PaymentNotFound(_)) => {
                AppError::BadRequest(err.to_string())
            }
            DepositError::Gateway(_) => AppError::Internal(err.to_string()),
            DepositError::Ledger(_) => AppError::BadRequest(err.to_string()),
            DepositError::Conflict => AppError::Conflict(err.to_string()),
            DepositError::Db(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<WithdrawalError> for AppError {
    fn from(err: WithdrawalError) -> Self {
        match &err {
            WithdrawalError::UserNotFound => AppError::NotFound(err.to_string()),
            WithdrawalError::InvalidAmount => AppError::BadRequest(err.to_string()),
            WithdrawalError::Ledger(LedgerError::InsufficientBalance { .. })
            | WithdrawalError::Conflict => AppError::Conflict(err.to_string()),
            WithdrawalError::Ledger(LedgerError::NegativeAmount(_)) => {
                AppError::BadRequest(err.to_string())
            }
            WithdrawalError::Db(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
