use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Decimal, TimeMs};
use crate::error::AppError;
use crate::orchestration::{DepositCallback, DepositOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCallbackRequest {
    pub payment_id: String,
    pub email: String,
    /// Amount as a decimal string, exactly as the provider reports it.
    pub amount: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCallbackResponse {
    pub credited: bool,
    pub already_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub async fn deposit_callback(
    State(state): State<AppState>,
    Json(request): Json<DepositCallbackRequest>,
) -> Result<Json<DepositCallbackResponse>, AppError> {
    if request.payment_id.trim().is_empty() {
        return Err(AppError::BadRequest("paymentId must not be empty".into()));
    }

    let amount = Decimal::from_str(request.amount.trim())
        .map_err(|_| AppError::BadRequest("Invalid amount".into()))?;

    let callback = DepositCallback {
        payment_id: request.payment_id.trim().to_string(),
        email: request.email.trim().to_lowercase(),
        amount,
        status: request.status,
    };

    let outcome = state
        .deposits
        .process_callback(&callback, TimeMs::now())
        .await?;

    let response = match outcome {
        DepositOutcome::Credited { new_balance } => DepositCallbackResponse {
            credited: true,
            already_processed: false,
            new_balance: Some(new_balance.to_canonical_string()),
            reason: None,
        },
        DepositOutcome::AlreadyProcessed => DepositCallbackResponse {
            credited: false,
            already_processed: true,
            new_balance: None,
            reason: None,
        },
        DepositOutcome::Ignored { reason } => DepositCallbackResponse {
            credited: false,
            already_processed: false,
            new_balance: None,
            reason: Some(reason),
        },
    };

    Ok(Json(response))
}
