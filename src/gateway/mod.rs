//! Payment gateway boundary for verifying external crypto payments.
//!
//! The service never talks to the Bitcoin network itself; deposit callbacks
//! are cross-checked against the gateway's records before any balance is
//! credited.

use crate::domain::Decimal;
use async_trait::async_trait;
use std::fmt;

pub mod cpay;
pub mod mock;

pub use cpay::CpayGateway;
pub use mock::MockGateway;

/// Payment state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

impl PaymentStatus {
    /// Parse a gateway status string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "completed" | "confirmed" | "paid" => Some(PaymentStatus::Completed),
            "pending" | "processing" => Some(PaymentStatus::Pending),
            "failed" | "cancelled" | "expired" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// The gateway's record of one payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVerification {
    pub payment_id: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
}

/// Payment gateway trait.
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait PaymentGateway: Send + Sync + fmt::Debug {
    /// Look up a payment by the gateway's payment id.
    async fn verify_payment(&self, payment_id: &str)
        -> Result<PaymentVerification, GatewayError>;
}

/// Error type for gateway operations.
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// The gateway has no record of this payment id
    PaymentNotFound(String),
    /// Other error
    Other(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            GatewayError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            GatewayError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            GatewayError::PaymentNotFound(id) => write!(f, "Payment not found: {}", id),
            GatewayError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}
