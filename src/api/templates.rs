use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatesResponse {
    pub templates: Vec<TemplateDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDto {
    pub id: String,
    pub name: String,
    pub investment_amount: String,
    pub reward_amount: String,
    pub claim_interval_ms: i64,
}

pub async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<TemplatesResponse>, AppError> {
    let templates = state
        .repo
        .list_templates()
        .await?
        .into_iter()
        .map(|t| TemplateDto {
            id: t.id,
            name: t.name,
            investment_amount: t.investment_amount.to_canonical_string(),
            reward_amount: t.reward_amount.to_canonical_string(),
            claim_interval_ms: t.claim_interval_ms,
        })
        .collect();

    Ok(Json(TemplatesResponse { templates }))
}
