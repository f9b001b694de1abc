//! Mock payment gateway for testing without network calls.

use super::{GatewayError, PaymentGateway, PaymentStatus, PaymentVerification};
use crate::domain::Decimal;
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock gateway that returns predefined payment records.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    payments: HashMap<String, PaymentVerification>,
}

impl MockGateway {
    /// Create a new mock gateway with no known payments.
    pub fn new() -> Self {
        Self {
            payments: HashMap::new(),
        }
    }

    /// Add a payment record to the mock gateway.
    pub fn with_payment(mut self, payment_id: &str, amount: Decimal, status: PaymentStatus) -> Self {
        self.payments.insert(
            payment_id.to_string(),
            PaymentVerification {
                payment_id: payment_id.to_string(),
                amount,
                status,
            },
        );
        self
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn verify_payment(
        &self,
        payment_id: &str,
    ) -> Result<PaymentVerification, GatewayError> {
        self.payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::PaymentNotFound(payment_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_returns_configured_payment() {
        let gateway = MockGateway::new().with_payment(
            "pay-1",
            Decimal::from_str_canonical("500").unwrap(),
            PaymentStatus::Completed,
        );

        let verification = gateway.verify_payment("pay-1").await.unwrap();
        assert_eq!(verification.amount.to_canonical_string(), "500");
        assert_eq!(verification.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_mock_gateway_unknown_payment() {
        let gateway = MockGateway::new();
        let err = gateway.verify_payment("pay-404").await.unwrap_err();
        assert!(matches!(err, GatewayError::PaymentNotFound(_)));
    }
}
