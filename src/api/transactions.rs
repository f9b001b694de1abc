use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::UserId;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub kind: String,
    /// "credit" or "debit", derived from the kind.
    pub direction: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    pub created_at_ms: i64,
}

pub async fn get_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let user_id = UserId::new(params.user_id);
    if state.repo.get_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let transactions = state
        .repo
        .list_transactions(&user_id)
        .await?
        .into_iter()
        .map(|t| TransactionDto {
            id: t.id,
            kind: t.kind.as_str().to_string(),
            direction: if t.kind.is_credit() { "credit" } else { "debit" }.to_string(),
            amount: t.amount.to_canonical_string(),
            payment_id: t.payment_id,
            machine_id: t.machine_id.map(|id| id.as_str().to_string()),
            created_at_ms: t.created_at.as_ms(),
        })
        .collect();

    Ok(Json(TransactionsResponse { transactions }))
}
