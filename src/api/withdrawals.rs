use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Decimal, TimeMs, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub user_id: String,
    /// Amount as a decimal string.
    pub amount: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub withdrawal_id: String,
    pub status: String,
    pub amount: String,
    pub new_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalsQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<WithdrawalDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDto {
    pub id: String,
    pub amount: String,
    pub address: String,
    pub status: String,
    pub created_at_ms: i64,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let address = request.address.trim().to_string();
    if address.is_empty() {
        return Err(AppError::BadRequest("address must not be empty".into()));
    }

    let amount = Decimal::from_str(request.amount.trim())
        .map_err(|_| AppError::BadRequest("Invalid amount".into()))?;

    let user_id = UserId::new(request.user_id);
    let receipt = state
        .withdrawals
        .request(&user_id, amount, address, TimeMs::now())
        .await?;

    Ok(Json(WithdrawalResponse {
        withdrawal_id: receipt.withdrawal.id.clone(),
        status: receipt.withdrawal.status.as_str().to_string(),
        amount: receipt.withdrawal.amount.to_canonical_string(),
        new_balance: receipt.new_balance.to_canonical_string(),
    }))
}

pub async fn get_withdrawals(
    Query(params): Query<WithdrawalsQuery>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalsResponse>, AppError> {
    let user_id = UserId::new(params.user_id);
    if state.repo.get_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let withdrawals = state
        .repo
        .list_withdrawals(&user_id)
        .await?
        .into_iter()
        .map(|w| WithdrawalDto {
            id: w.id,
            amount: w.amount.to_canonical_string(),
            address: w.address,
            status: w.status.as_str().to_string(),
            created_at_ms: w.created_at.as_ms(),
        })
        .collect();

    Ok(Json(WithdrawalsResponse { withdrawals }))
}
