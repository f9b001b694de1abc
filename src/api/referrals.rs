use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Decimal, UserId};
use crate::engine::referral_tier;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralsQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralsResponse {
    pub referral_code: String,
    pub referral_count: i64,
    pub tier: TierDto,
    pub total_bonus_earned: String,
    pub referrals: Vec<ReferralDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDto {
    pub label: String,
    pub claim_interval_multiplier: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralDto {
    pub referee_id: String,
    pub bonus_earned: String,
    pub created_at_ms: i64,
}

pub async fn get_referrals(
    Query(params): Query<ReferralsQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReferralsResponse>, AppError> {
    let user_id = UserId::new(params.user_id);
    let user = state
        .repo
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let edges = state.repo.list_referrals(&user_id).await?;
    let tier = referral_tier::tier_for(edges.len() as i64);

    let mut total_bonus = Decimal::zero();
    for edge in &edges {
        total_bonus = total_bonus + edge.bonus_earned;
    }

    let referral_count = edges.len() as i64;
    let referrals = edges
        .into_iter()
        .map(|edge| ReferralDto {
            referee_id: edge.referee_id.as_str().to_string(),
            bonus_earned: edge.bonus_earned.to_canonical_string(),
            created_at_ms: edge.created_at.as_ms(),
        })
        .collect();

    Ok(Json(ReferralsResponse {
        referral_code: user.referral_code,
        referral_count,
        tier: TierDto {
            label: tier.label.to_string(),
            claim_interval_multiplier: tier.claim_interval_multiplier.to_canonical_string(),
        },
        total_bonus_earned: total_bonus.to_canonical_string(),
        referrals,
    }))
}
