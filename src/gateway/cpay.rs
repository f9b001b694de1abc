//! CPay gateway client.

use super::{GatewayError, PaymentGateway, PaymentStatus, PaymentVerification};
use crate::domain::Decimal;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Payment gateway backed by the CPay checkout API.
#[derive(Debug, Clone)]
pub struct CpayGateway {
    client: Client,
    base_url: String,
}

impl CpayGateway {
    /// Create a new CPay gateway client.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_payment(&self, payment_id: &str) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(GatewayError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 404 {
                return Err(backoff::Error::permanent(GatewayError::PaymentNotFound(
                    payment_id.to_string(),
                )));
            }
            if status == 429 {
                return Err(backoff::Error::transient(GatewayError::HttpError {
                    status: status.as_u16(),
                    message: "Rate limited".to_string(),
                }));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(GatewayError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(GatewayError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(GatewayError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PaymentGateway for CpayGateway {
    async fn verify_payment(
        &self,
        payment_id: &str,
    ) -> Result<PaymentVerification, GatewayError> {
        debug!("Verifying payment id={}", payment_id);

        let response = self.get_payment(payment_id).await?;
        parse_verification(&response)
    }
}

fn parse_verification(payment_json: &serde_json::Value) -> Result<PaymentVerification, GatewayError> {
    let payment_id = payment_json
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::ParseError("Missing id field".to_string()))?
        .to_string();

    let amount_str = payment_json
        .get("amount")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::ParseError("Missing amount field".to_string()))?;
    let amount = Decimal::from_str_canonical(amount_str)
        .map_err(|e| GatewayError::ParseError(format!("Invalid amount: {}", e)))?;

    let status_str = payment_json
        .get("status")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::ParseError("Missing status field".to_string()))?;
    let status = PaymentStatus::parse(status_str)
        .ok_or_else(|| GatewayError::ParseError(format!("Invalid status: {}", status_str)))?;

    Ok(PaymentVerification {
        payment_id,
        amount,
        status,
    })
}
