pub mod deposits;
pub mod health;
pub mod machines;
pub mod referrals;
pub mod templates;
pub mod transactions;
pub mod users;
pub mod withdrawals;

use crate::config::Config;
use crate::db::Repository;
use crate::gateway::PaymentGateway;
use crate::orchestration::{ClaimService, DepositService, PurchaseService, WithdrawalService};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub claims: Arc<ClaimService>,
    pub purchases: Arc<PurchaseService>,
    pub deposits: Arc<DepositService>,
    pub withdrawals: Arc<WithdrawalService>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let claims = Arc::new(ClaimService::new(repo.clone()));
        let purchases = Arc::new(PurchaseService::new(
            repo.clone(),
            config.earnings_cap_multiplier,
            config.referral_bonus_percent,
        ));
        let deposits = Arc::new(DepositService::new(repo.clone(), gateway));
        let withdrawals = Arc::new(WithdrawalService::new(repo.clone()));

        Self {
            repo,
            config,
            claims,
            purchases,
            deposits,
            withdrawals,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/users", post(users::register_user))
        .route("/v1/users/:id", get(users::get_user_summary))
        .route("/v1/templates", get(templates::list_templates))
        .route(
            "/v1/machines",
            get(machines::list_machines).post(machines::purchase_machine),
        )
        .route("/v1/machines/claim", post(machines::claim_machine))
        .route("/v1/deposits/callback", post(deposits::deposit_callback))
        .route("/v1/transactions", get(transactions::get_transactions))
        .route(
            "/v1/withdrawals",
            get(withdrawals::get_withdrawals).post(withdrawals::request_withdrawal),
        )
        .route("/v1/referrals", get(referrals::get_referrals))
        .layer(cors)
        .with_state(state)
}
