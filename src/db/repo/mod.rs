//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `machines.rs` - Machine reads and the claim/purchase commit paths
//! - `transactions.rs` - Ledger history, deposit idempotency, withdrawals
//!
//! Monetary values round-trip as canonical decimal strings; the
//! compare-and-swap updates below predicate on those same strings, which is
//! what makes the read-check-write sequences in the orchestration layer safe
//! against concurrent writers.

mod machines;
mod transactions;

pub use transactions::DepositCommit;

use crate::domain::{Decimal, MachineTemplate, ReferralEdge, TimeMs, User, UserId};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // User operations
    // =========================================================================

    /// Insert a user row.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including UNIQUE violations on
    /// email, username, or referral code).
    pub async fn insert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users
            (id, email, username, balance, total_invested, total_earned, referral_code, referred_by, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.balance.to_canonical_string())
        .bind(user.total_invested.to_canonical_string())
        .bind(user.total_earned.to_canonical_string())
        .bind(&user.referral_code)
        .bind(user.referred_by.as_ref().map(|id| id.as_str().to_string()))
        .bind(user.created_at.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a user and, when a referral code was redeemed, its inbound
    /// referral edge, atomically.
    pub async fn create_user_with_referral(
        &self,
        user: &User,
        edge: Option<&ReferralEdge>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users
            (id, email, username, balance, total_invested, total_earned, referral_code, referred_by, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.balance.to_canonical_string())
        .bind(user.total_invested.to_canonical_string())
        .bind(user.total_earned.to_canonical_string())
        .bind(&user.referral_code)
        .bind(user.referred_by.as_ref().map(|id| id.as_str().to_string()))
        .bind(user.created_at.as_ms())
        .execute(&mut *tx)
        .await?;

        if let Some(edge) = edge {
            sqlx::query(
                r#"
                INSERT INTO referrals (id, referrer_id, referee_id, bonus_earned, created_at_ms)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&edge.id)
            .bind(edge.referrer_id.as_str())
            .bind(edge.referee_id.as_str())
            .bind(edge.bonus_earned.to_canonical_string())
            .bind(edge.created_at.as_ms())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetch a user by id.
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| parse_user_row(&r)))
    }

    /// Fetch a user by email (deposit callbacks resolve the target this way).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| parse_user_row(&r)))
    }

    /// Fetch a user by referral code.
    pub async fn get_user_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| parse_user_row(&r)))
    }

    /// Compare-and-swap the financial counters of a user.
    ///
    /// Succeeds only if the stored balance still matches `old`'s; returns
    /// false when a concurrent writer got there first. Callers re-read and
    /// recompute through the ledger on false.
    pub async fn update_user_cas(&self, old: &User, new: &User) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = ?, total_invested = ?, total_earned = ?
            WHERE id = ? AND balance = ? AND total_invested = ? AND total_earned = ?
            "#,
        )
        .bind(new.balance.to_canonical_string())
        .bind(new.total_invested.to_canonical_string())
        .bind(new.total_earned.to_canonical_string())
        .bind(old.id.as_str())
        .bind(old.balance.to_canonical_string())
        .bind(old.total_invested.to_canonical_string())
        .bind(old.total_earned.to_canonical_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Referral operations
    // =========================================================================

    /// Number of referees this user has referred.
    pub async fn count_referrals(&self, referrer_id: &UserId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM referrals WHERE referrer_id = ?")
            .bind(referrer_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("n"))
    }

    /// All edges where this user is the referrer, oldest first.
    pub async fn list_referrals(
        &self,
        referrer_id: &UserId,
    ) -> Result<Vec<ReferralEdge>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM referrals WHERE referrer_id = ? ORDER BY created_at_ms ASC, id ASC",
        )
        .bind(referrer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(parse_referral_row).collect())
    }

    /// The inbound edge for a referee, if any.
    pub async fn get_referral_by_referee(
        &self,
        referee_id: &UserId,
    ) -> Result<Option<ReferralEdge>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM referrals WHERE referee_id = ?")
            .bind(referee_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| parse_referral_row(&r)))
    }

    // =========================================================================
    // Template operations
    // =========================================================================

    /// Insert a machine template (tests and admin tooling).
    pub async fn insert_template(&self, template: &MachineTemplate) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO machine_templates
            (id, name, investment_amount, reward_amount, claim_interval_ms, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(template.investment_amount.to_canonical_string())
        .bind(template.reward_amount.to_canonical_string())
        .bind(template.claim_interval_ms)
        .bind(template.is_active as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a template by id.
    pub async fn get_template(&self, id: &str) -> Result<Option<MachineTemplate>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM machine_templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| parse_template_row(&r)))
    }

    /// List active templates, cheapest first.
    pub async fn list_templates(&self) -> Result<Vec<MachineTemplate>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM machine_templates
            WHERE is_active = 1
            ORDER BY CAST(investment_amount AS REAL) ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(parse_template_row).collect())
    }
}

/// Parse a decimal column, warning and defaulting to zero on corruption.
pub(crate) fn parse_decimal_field(row_value: &str, column: &str) -> Decimal {
    Decimal::from_str(row_value).unwrap_or_else(|e| {
        warn!(
            column = column,
            value = %row_value,
            error = %e,
            "Failed to parse decimal column, using default"
        );
        Decimal::default()
    })
}

fn parse_user_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let balance: String = row.get("balance");
    let total_invested: String = row.get("total_invested");
    let total_earned: String = row.get("total_earned");
    let referred_by: Option<String> = row.get("referred_by");

    User {
        id: UserId::new(row.get("id")),
        email: row.get("email"),
        username: row.get("username"),
        balance: parse_decimal_field(&balance, "users.balance"),
        total_invested: parse_decimal_field(&total_invested, "users.total_invested"),
        total_earned: parse_decimal_field(&total_earned, "users.total_earned"),
        referral_code: row.get("referral_code"),
        referred_by: referred_by.map(UserId::new),
        created_at: TimeMs::new(row.get("created_at_ms")),
    }
}

fn parse_referral_row(row: &sqlx::sqlite::SqliteRow) -> ReferralEdge {
    let bonus: String = row.get("bonus_earned");

    ReferralEdge {
        id: row.get("id"),
        referrer_id: UserId::new(row.get("referrer_id")),
        referee_id: UserId::new(row.get("referee_id")),
        bonus_earned: parse_decimal_field(&bonus, "referrals.bonus_earned"),
        created_at: TimeMs::new(row.get("created_at_ms")),
    }
}

fn parse_template_row(row: &sqlx::sqlite::SqliteRow) -> MachineTemplate {
    let investment: String = row.get("investment_amount");
    let reward: String = row.get("reward_amount");
    let is_active: i64 = row.get("is_active");

    MachineTemplate {
        id: row.get("id"),
        name: row.get("name"),
        investment_amount: parse_decimal_field(&investment, "machine_templates.investment_amount"),
        reward_amount: parse_decimal_field(&reward, "machine_templates.reward_amount"),
        claim_interval_ms: row.get("claim_interval_ms"),
        is_active: is_active != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn test_user(email: &str, username: &str) -> User {
        User::register(email.to_string(), username.to_string(), None, TimeMs::new(1000))
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let (repo, _temp) = setup_test_db().await;

        let user = test_user("ada@example.com", "ada");
        repo.insert_user(&user).await.expect("insert failed");

        let fetched = repo.get_user(&user.id).await.expect("query failed");
        assert_eq!(fetched, Some(user));
    }

    #[tokio::test]
    async fn test_get_user_by_email_and_code() {
        let (repo, _temp) = setup_test_db().await;

        let user = test_user("ada@example.com", "ada");
        repo.insert_user(&user).await.unwrap();

        let by_email = repo.get_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(by_email.as_ref(), Some(&user));

        let by_code = repo
            .get_user_by_referral_code(&user.referral_code)
            .await
            .unwrap();
        assert_eq!(by_code, Some(user));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_user(&test_user("ada@example.com", "ada"))
            .await
            .unwrap();
        let result = repo.insert_user(&test_user("ada@example.com", "ada2")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_user_cas_detects_stale_read() {
        let (repo, _temp) = setup_test_db().await;

        let user = test_user("ada@example.com", "ada");
        repo.insert_user(&user).await.unwrap();

        let mut credited = user.clone();
        credited.balance = Decimal::from_str("100").unwrap();

        assert!(repo.update_user_cas(&user, &credited).await.unwrap());
        // Second writer still holding the original snapshot loses.
        assert!(!repo.update_user_cas(&user, &credited).await.unwrap());
    }

    #[tokio::test]
    async fn test_referral_edge_roundtrip_and_count() {
        let (repo, _temp) = setup_test_db().await;

        let referrer = test_user("ada@example.com", "ada");
        repo.insert_user(&referrer).await.unwrap();

        let referee = User::register(
            "bob@example.com".to_string(),
            "bob".to_string(),
            Some(referrer.id.clone()),
            TimeMs::new(2000),
        );
        let edge = ReferralEdge::new(referrer.id.clone(), referee.id.clone(), TimeMs::new(2000));
        repo.create_user_with_referral(&referee, Some(&edge))
            .await
            .unwrap();

        assert_eq!(repo.count_referrals(&referrer.id).await.unwrap(), 1);
        assert_eq!(repo.list_referrals(&referrer.id).await.unwrap(), vec![edge.clone()]);
        assert_eq!(
            repo.get_referral_by_referee(&referee.id).await.unwrap(),
            Some(edge)
        );
    }

    #[tokio::test]
    async fn test_second_inbound_referral_rejected() {
        let (repo, _temp) = setup_test_db().await;

        let referrer = test_user("ada@example.com", "ada");
        let other = test_user("eve@example.com", "eve");
        repo.insert_user(&referrer).await.unwrap();
        repo.insert_user(&other).await.unwrap();

        let referee = test_user("bob@example.com", "bob");
        let edge = ReferralEdge::new(referrer.id.clone(), referee.id.clone(), TimeMs::new(2000));
        repo.create_user_with_referral(&referee, Some(&edge))
            .await
            .unwrap();

        let duplicate = ReferralEdge::new(other.id.clone(), referee.id.clone(), TimeMs::new(3000));
        let result = sqlx::query(
            "INSERT INTO referrals (id, referrer_id, referee_id, bonus_earned, created_at_ms) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&duplicate.id)
        .bind(duplicate.referrer_id.as_str())
        .bind(duplicate.referee_id.as_str())
        .bind(duplicate.bonus_earned.to_canonical_string())
        .bind(duplicate.created_at.as_ms())
        .execute(repo.pool())
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_seeded_templates_listed() {
        let (repo, _temp) = setup_test_db().await;

        let templates = repo.list_templates().await.unwrap();
        assert_eq!(templates.len(), 3);
        assert_eq!(templates[0].id, "tmpl-starter");

        let starter = repo.get_template("tmpl-starter").await.unwrap().unwrap();
        assert_eq!(starter.investment_amount.to_canonical_string(), "100");
        assert_eq!(starter.claim_interval_ms, 600_000);
    }
}
