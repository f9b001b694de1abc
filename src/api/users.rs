use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{TimeMs, User, UserId};
use crate::engine::referral_tier;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub username: String,
    pub balance: String,
    pub total_invested: String,
    pub total_earned: String,
    pub referral_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    pub created_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryResponse {
    #[serde(flatten)]
    pub user: UserDto,
    pub referral_count: i64,
    pub referral_tier: String,
}

fn user_dto(user: &User) -> UserDto {
    UserDto {
        id: user.id.as_str().to_string(),
        email: user.email.clone(),
        username: user.username.clone(),
        balance: user.balance.to_canonical_string(),
        total_invested: user.total_invested.to_canonical_string(),
        total_earned: user.total_earned.to_canonical_string(),
        referral_code: user.referral_code.clone(),
        referred_by: user.referred_by.as_ref().map(|id| id.as_str().to_string()),
        created_at_ms: user.created_at.as_ms(),
    }
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserDto>, AppError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username must not be empty".into()));
    }

    let referrer = match request.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            state
                .repo
                .get_user_by_referral_code(code)
                .await?
                .ok_or_else(|| AppError::NotFound("Unknown referral code".into()))?,
        ),
        _ => None,
    };

    let now = TimeMs::now();
    let user = User::register(email, username, referrer.as_ref().map(|r| r.id.clone()), now);
    let edge = referrer
        .as_ref()
        .map(|r| crate::domain::ReferralEdge::new(r.id.clone(), user.id.clone(), now));

    state
        .repo
        .create_user_with_referral(&user, edge.as_ref())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.message().contains("UNIQUE") => {
                AppError::Conflict("Email or username already registered".into())
            }
            _ => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(user_dto(&user)))
}

pub async fn get_user_summary(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserSummaryResponse>, AppError> {
    let user_id = UserId::new(id);
    let user = state
        .repo
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let referral_count = state.repo.count_referrals(&user_id).await?;
    let tier = referral_tier::tier_for(referral_count);

    Ok(Json(UserSummaryResponse {
        user: user_dto(&user),
        referral_count,
        referral_tier: tier.label.to_string(),
    }))
}
