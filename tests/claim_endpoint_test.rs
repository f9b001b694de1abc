use axum::http::StatusCode;
use chronovault::api;
use chronovault::config::Config;
use chronovault::db::init_db;
use chronovault::domain::{Decimal, Machine, MachineId, TimeMs, User, UserId};
use chronovault::gateway::MockGateway;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<chronovault::Repository>,
    _temp: TempDir,
}

fn test_config(db_path: String) -> Config {
    Config {
        port: 0,
        database_path: db_path,
        cpay_api_url: "http://example.invalid".to_string(),
        earnings_cap_multiplier: Decimal::from_str("2").unwrap(),
        referral_bonus_percent: Decimal::from_str("5").unwrap(),
    }
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(chronovault::Repository::new(pool));

    let state = api::AppState::new(repo.clone(), test_config(db_path), Arc::new(MockGateway::new()));
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        _temp: temp_dir,
    }
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, Vec<u8>) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

async fn seed_user(repo: &chronovault::Repository, email: &str, username: &str) -> User {
    let user = User::register(email.to_string(), username.to_string(), None, TimeMs::new(1000));
    repo.insert_user(&user).await.unwrap();
    user
}

async fn seed_machine(
    repo: &chronovault::Repository,
    user_id: &UserId,
    last_claimed_at: TimeMs,
    current_earnings: &str,
) -> Machine {
    let machine = Machine {
        id: MachineId::generate(),
        user_id: user_id.clone(),
        template_id: Some("tmpl-starter".to_string()),
        name: "Starter Rig".to_string(),
        investment_amount: Decimal::from_str("100").unwrap(),
        reward_amount: Decimal::from_str("20").unwrap(),
        claim_interval_ms: 600_000,
        last_claimed_at,
        current_earnings: Decimal::from_str(current_earnings).unwrap(),
        max_earnings: Decimal::from_str("200").unwrap(),
        is_active: true,
        purchased_at: TimeMs::new(1000),
    };
    repo.insert_machine(&machine).await.unwrap();
    machine
}

fn claim_body(user: &User, machine: &Machine) -> serde_json::Value {
    serde_json::json!({
        "userId": user.id.as_str(),
        "machineId": machine.id.as_str(),
    })
}

#[tokio::test]
async fn test_claim_credits_reward_and_updates_machine() {
    let test_app = setup_test_app().await;
    let user = seed_user(&test_app.repo, "ada@example.com", "ada").await;
    let machine = seed_machine(&test_app.repo, &user.id, TimeMs::new(0), "0").await;

    let (status, body) = post_json(
        test_app.app,
        "/v1/machines/claim",
        claim_body(&user, &machine),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["creditedAmount"], "20");
    assert_eq!(v["newBalance"], "20");
    assert_eq!(v["machine"]["currentEarnings"], "20");
    assert_eq!(v["machine"]["isActive"], true);
    assert_eq!(v["machine"]["eligible"], false);

    let stored = test_app.repo.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.balance.to_canonical_string(), "20");
    assert_eq!(stored.total_earned.to_canonical_string(), "20");

    let stored_machine = test_app
        .repo
        .get_machine(&machine.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored_machine.last_claimed_at.as_ms() > 0);
}

#[tokio::test]
async fn test_claim_records_ledger_transaction() {
    let test_app = setup_test_app().await;
    let user = seed_user(&test_app.repo, "ada@example.com", "ada").await;
    let machine = seed_machine(&test_app.repo, &user.id, TimeMs::new(0), "0").await;

    let (status, _body) = post_json(
        test_app.app,
        "/v1/machines/claim",
        claim_body(&user, &machine),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let records = test_app.repo.list_transactions(&user.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind.as_str(), "claim");
    assert_eq!(records[0].amount.to_canonical_string(), "20");
    assert_eq!(records[0].machine_id.as_ref().map(|m| m.as_str().to_string()), Some(machine.id.as_str().to_string()));
}

#[tokio::test]
async fn test_claim_during_cooldown_conflicts() {
    let test_app = setup_test_app().await;
    let user = seed_user(&test_app.repo, "ada@example.com", "ada").await;
    // Claimed just now: the full 10-minute cooldown still applies.
    let machine = seed_machine(&test_app.repo, &user.id, TimeMs::now(), "20").await;

    let (status, body) = post_json(
        test_app.app,
        "/v1/machines/claim",
        claim_body(&user, &machine),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(v["error"].as_str().unwrap().contains("not eligible"));

    let stored = test_app.repo.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.balance.is_zero());
}

#[tokio::test]
async fn test_final_claim_clamps_to_ceiling_and_deactivates() {
    let test_app = setup_test_app().await;
    let user = seed_user(&test_app.repo, "ada@example.com", "ada").await;
    let machine = seed_machine(&test_app.repo, &user.id, TimeMs::new(0), "190").await;

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/machines/claim",
        claim_body(&user, &machine),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["creditedAmount"], "10");
    assert_eq!(v["machine"]["currentEarnings"], "200");
    assert_eq!(v["machine"]["isActive"], false);

    // The machine is done for good.
    let (status, _body) = post_json(
        test_app.app,
        "/v1/machines/claim",
        claim_body(&user, &machine),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_claim_unknown_machine_is_404() {
    let test_app = setup_test_app().await;
    let user = seed_user(&test_app.repo, "ada@example.com", "ada").await;

    let (status, _body) = post_json(
        test_app.app,
        "/v1/machines/claim",
        serde_json::json!({
            "userId": user.id.as_str(),
            "machineId": "m-nonexistent",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_claim_foreign_machine_is_rejected() {
    let test_app = setup_test_app().await;
    let owner = seed_user(&test_app.repo, "ada@example.com", "ada").await;
    let machine = seed_machine(&test_app.repo, &owner.id, TimeMs::new(0), "0").await;
    let intruder = seed_user(&test_app.repo, "eve@example.com", "eve").await;

    let (status, _body) = post_json(
        test_app.app,
        "/v1/machines/claim",
        serde_json::json!({
            "userId": intruder.id.as_str(),
            "machineId": machine.id.as_str(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = test_app.repo.get_user(&intruder.id).await.unwrap().unwrap();
    assert!(stored.balance.is_zero());
}
