use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Machine, MachineId, TimeMs, UserId};
use crate::engine::{eligibility, portfolio, referral_tier};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinesQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinesResponse {
    pub machines: Vec<MachineDto>,
    pub portfolio: PortfolioDto,
    pub referral_tier: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDto {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub investment_amount: String,
    pub reward_amount: String,
    pub claim_interval_ms: i64,
    pub effective_claim_interval_ms: i64,
    pub last_claimed_at_ms: i64,
    pub current_earnings: String,
    pub max_earnings: String,
    pub is_active: bool,
    pub eligible: bool,
    pub remaining_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDto {
    pub daily_potential: String,
    pub weekly_potential: String,
    pub monthly_potential: String,
    pub total_invested: String,
    pub total_current_earnings: String,
    pub roi_percent: String,
    pub active_machines: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub user_id: String,
    pub template_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub machine_id: String,
    pub name: String,
    pub investment_amount: String,
    pub max_earnings: String,
    pub new_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub user_id: String,
    pub machine_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub credited_amount: String,
    pub new_balance: String,
    pub machine: MachineDto,
}

fn machine_dto(machine: &Machine, effective_interval_ms: i64, now: TimeMs) -> MachineDto {
    let check = eligibility::evaluate(machine, effective_interval_ms, now);
    MachineDto {
        id: machine.id.as_str().to_string(),
        name: machine.name.clone(),
        template_id: machine.template_id.clone(),
        investment_amount: machine.investment_amount.to_canonical_string(),
        reward_amount: machine.reward_amount.to_canonical_string(),
        claim_interval_ms: machine.claim_interval_ms,
        effective_claim_interval_ms: effective_interval_ms,
        last_claimed_at_ms: machine.last_claimed_at.as_ms(),
        current_earnings: machine.current_earnings.to_canonical_string(),
        max_earnings: machine.max_earnings.to_canonical_string(),
        is_active: machine.is_active,
        eligible: check.eligible,
        remaining_ms: check.remaining_ms,
    }
}

pub async fn list_machines(
    Query(params): Query<MachinesQuery>,
    State(state): State<AppState>,
) -> Result<Json<MachinesResponse>, AppError> {
    let user_id = UserId::new(params.user_id);
    if state.repo.get_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let machines = state.repo.list_machines(&user_id).await?;
    let referral_count = state.repo.count_referrals(&user_id).await?;
    let tier = referral_tier::tier_for(referral_count);
    let now = TimeMs::now();

    let summary = portfolio::aggregate(&machines);
    let machine_dtos = machines
        .iter()
        .map(|m| {
            let effective = referral_tier::effective_interval_ms(m.claim_interval_ms, &tier);
            machine_dto(m, effective, now)
        })
        .collect();

    Ok(Json(MachinesResponse {
        machines: machine_dtos,
        portfolio: PortfolioDto {
            daily_potential: summary.daily_potential.to_canonical_string(),
            weekly_potential: summary.weekly_potential.to_canonical_string(),
            monthly_potential: summary.monthly_potential.to_canonical_string(),
            total_invested: summary.total_invested.to_canonical_string(),
            total_current_earnings: summary.total_current_earnings.to_canonical_string(),
            roi_percent: summary.roi_percent.to_canonical_string(),
            active_machines: summary.active_machines,
        },
        referral_tier: tier.label.to_string(),
    }))
}

pub async fn purchase_machine(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let user_id = UserId::new(request.user_id);

    let receipt = state
        .purchases
        .purchase(&user_id, &request.template_id, TimeMs::now())
        .await?;

    Ok(Json(PurchaseResponse {
        machine_id: receipt.machine.id.as_str().to_string(),
        name: receipt.machine.name.clone(),
        investment_amount: receipt.machine.investment_amount.to_canonical_string(),
        max_earnings: receipt.machine.max_earnings.to_canonical_string(),
        new_balance: receipt.new_balance.to_canonical_string(),
    }))
}

pub async fn claim_machine(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, AppError> {
    let user_id = UserId::new(request.user_id);
    let machine_id = MachineId::new(request.machine_id);
    let now = TimeMs::now();

    let receipt = state.claims.claim(&user_id, &machine_id, now).await?;

    let referral_count = state.repo.count_referrals(&user_id).await?;
    let tier = referral_tier::tier_for(referral_count);
    let effective =
        referral_tier::effective_interval_ms(receipt.machine.claim_interval_ms, &tier);

    Ok(Json(ClaimResponse {
        credited_amount: receipt.credited.to_canonical_string(),
        new_balance: receipt.new_balance.to_canonical_string(),
        machine: machine_dto(&receipt.machine, effective, now),
    }))
}
