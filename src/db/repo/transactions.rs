//! Ledger history, deposit idempotency, withdrawals, and referral bonus
//! accrual.

use super::machines::insert_transaction_stmt;
use super::{parse_decimal_field, Repository};
use crate::domain::{
    Decimal, MachineId, TimeMs, Transaction, TransactionKind, User, UserId, Withdrawal,
    WithdrawalStatus,
};
use sqlx::Row;
use tracing::warn;

/// Outcome of a deposit commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositCommit {
    /// Transaction recorded and balance credited.
    Credited,
    /// A transaction with this payment id already exists; nothing written.
    AlreadyProcessed,
    /// The user row changed since it was read; nothing written, re-read and retry.
    Conflict,
}

impl Repository {
    /// Insert a ledger transaction idempotently.
    ///
    /// Returns false when a row with the same payment id (or id) already
    /// exists.
    pub async fn insert_transaction(&self, record: &Transaction) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        let inserted = insert_transaction_stmt(&mut tx, record).await?;
        tx.commit().await?;
        Ok(inserted > 0)
    }

    /// A user's ledger entries, newest first.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at_ms DESC, id DESC",
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(parse_transaction_row).collect())
    }

    /// Commit a confirmed deposit atomically: record the transaction (the
    /// payment id is the idempotency key) and credit the balance.
    ///
    /// Duplicate callbacks are detected by the transaction insert affecting
    /// zero rows, in which case nothing is written and the whole operation
    /// reports `AlreadyProcessed`.
    pub async fn commit_deposit(
        &self,
        record: &Transaction,
        old_user: &User,
        new_user: &User,
    ) -> Result<DepositCommit, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let inserted = insert_transaction_stmt(&mut tx, record).await?;
        if inserted == 0 {
            return Ok(DepositCommit::AlreadyProcessed);
        }

        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = ?
            WHERE id = ? AND balance = ?
            "#,
        )
        .bind(new_user.balance.to_canonical_string())
        .bind(old_user.id.as_str())
        .bind(old_user.balance.to_canonical_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(DepositCommit::Conflict);
        }

        tx.commit().await?;
        Ok(DepositCommit::Credited)
    }

    /// Commit a withdrawal request atomically: debit the balance (guarded by
    /// a compare-and-swap), insert the pending withdrawal, and record the
    /// transaction.
    pub async fn commit_withdrawal(
        &self,
        old_user: &User,
        new_user: &User,
        withdrawal: &Withdrawal,
        record: &Transaction,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = ?
            WHERE id = ? AND balance = ?
            "#,
        )
        .bind(new_user.balance.to_canonical_string())
        .bind(old_user.id.as_str())
        .bind(old_user.balance.to_canonical_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO withdrawals (id, user_id, amount, address, status, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&withdrawal.id)
        .bind(withdrawal.user_id.as_str())
        .bind(withdrawal.amount.to_canonical_string())
        .bind(&withdrawal.address)
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.created_at.as_ms())
        .execute(&mut *tx)
        .await?;

        insert_transaction_stmt(&mut tx, record).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// A user's withdrawal requests, newest first.
    pub async fn list_withdrawals(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Withdrawal>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM withdrawals WHERE user_id = ? ORDER BY created_at_ms DESC, id DESC",
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(parse_withdrawal_row).collect())
    }

    /// Commit a referral bonus atomically: credit the referrer (balance
    /// compare-and-swap), accrue the edge's `bonus_earned` (same guard), and
    /// record the transaction.
    pub async fn commit_referral_bonus(
        &self,
        old_referrer: &User,
        new_referrer: &User,
        edge_id: &str,
        old_bonus: &Decimal,
        new_bonus: &Decimal,
        record: &Transaction,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = ?, total_earned = ?
            WHERE id = ? AND balance = ? AND total_earned = ?
            "#,
        )
        .bind(new_referrer.balance.to_canonical_string())
        .bind(new_referrer.total_earned.to_canonical_string())
        .bind(old_referrer.id.as_str())
        .bind(old_referrer.balance.to_canonical_string())
        .bind(old_referrer.total_earned.to_canonical_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET bonus_earned = ?
            WHERE id = ? AND bonus_earned = ?
            "#,
        )
        .bind(new_bonus.to_canonical_string())
        .bind(edge_id)
        .bind(old_bonus.to_canonical_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        insert_transaction_stmt(&mut tx, record).await?;

        tx.commit().await?;
        Ok(true)
    }
}

fn parse_transaction_row(row: &sqlx::sqlite::SqliteRow) -> Transaction {
    let amount: String = row.get("amount");
    let kind_str: String = row.get("kind");
    let kind = TransactionKind::parse(&kind_str).unwrap_or_else(|| {
        warn!(kind = %kind_str, "Unknown transaction kind in storage, defaulting to deposit");
        TransactionKind::Deposit
    });
    let machine_id: Option<String> = row.get("machine_id");

    Transaction {
        id: row.get("id"),
        user_id: UserId::new(row.get("user_id")),
        kind,
        amount: parse_decimal_field(&amount, "transactions.amount"),
        payment_id: row.get("payment_id"),
        machine_id: machine_id.map(MachineId::new),
        created_at: TimeMs::new(row.get("created_at_ms")),
    }
}

fn parse_withdrawal_row(row: &sqlx::sqlite::SqliteRow) -> Withdrawal {
    let amount: String = row.get("amount");
    let status_str: String = row.get("status");
    let status = WithdrawalStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown withdrawal status in storage, defaulting to pending");
        WithdrawalStatus::Pending
    });

    Withdrawal {
        id: row.get("id"),
        user_id: UserId::new(row.get("user_id")),
        amount: parse_decimal_field(&amount, "withdrawals.amount"),
        address: row.get("address"),
        status,
        created_at: TimeMs::new(row.get("created_at_ms")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use std::str::FromStr;
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

    async fn seed_user(repo: &Repository, email: &str, username: &str, balance: &str) -> User {
        let mut user = User::register(
            email.to_string(),
            username.to_string(),
            None,
            TimeMs::new(1000),
        );
        user.balance = Decimal::from_str(balance).unwrap();
        repo.insert_user(&user).await.unwrap();
        user
    }

    fn deposit_record(user_id: &UserId, payment_id: &str, amount: &str) -> Transaction {
        Transaction::new(
            user_id.clone(),
            TransactionKind::Deposit,
            Decimal::from_str(amount).unwrap(),
            Some(payment_id.to_string()),
            None,
            TimeMs::new(2000),
        )
    }

    #[tokio::test]
    async fn test_insert_duplicate_payment_id_ignored() {
        let (repo, _temp) = setup_test_db().await;
        let user = seed_user(&repo, "ada@example.com", "ada", "0").await;

        let first = deposit_record(&user.id, "pay-1", "500");
        let second = deposit_record(&user.id, "pay-1", "500");

        assert!(repo.insert_transaction(&first).await.unwrap());
        assert!(!repo.insert_transaction(&second).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_deposit_credits_once() {
        let (repo, _temp) = setup_test_db().await;
        let user = seed_user(&repo, "ada@example.com", "ada", "0").await;

        let mut credited = user.clone();
        credited.balance = Decimal::from_str("500").unwrap();

        let outcome = repo
            .commit_deposit(&deposit_record(&user.id, "pay-1", "500"), &user, &credited)
            .await
            .unwrap();
        assert_eq!(outcome, DepositCommit::Credited);

        // Same payment id again: no credit, no second transaction.
        let fresh = repo.get_user(&user.id).await.unwrap().unwrap();
        let mut doubled = fresh.clone();
        doubled.balance = Decimal::from_str("1000").unwrap();
        let outcome = repo
            .commit_deposit(&deposit_record(&user.id, "pay-1", "500"), &fresh, &doubled)
            .await
            .unwrap();
        assert_eq!(outcome, DepositCommit::AlreadyProcessed);

        let stored = repo.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.balance.to_canonical_string(), "500");
        assert_eq!(repo.list_transactions(&user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_deposit_stale_user_conflicts_without_record() {
        let (repo, _temp) = setup_test_db().await;
        let user = seed_user(&repo, "ada@example.com", "ada", "100").await;

        let mut stale = user.clone();
        stale.balance = Decimal::from_str("0").unwrap();
        let mut credited = stale.clone();
        credited.balance = Decimal::from_str("500").unwrap();

        let outcome = repo
            .commit_deposit(&deposit_record(&user.id, "pay-1", "500"), &stale, &credited)
            .await
            .unwrap();
        assert_eq!(outcome, DepositCommit::Conflict);

        // The transaction insert rolled back with the credit, so a retry
        // with a fresh read still succeeds.
        assert!(repo.list_transactions(&user.id).await.unwrap().is_empty());
        let fresh = repo.get_user(&user.id).await.unwrap().unwrap();
        let mut recredited = fresh.clone();
        recredited.balance = Decimal::from_str("600").unwrap();
        let outcome = repo
            .commit_deposit(
                &deposit_record(&user.id, "pay-1", "500"),
                &fresh,
                &recredited,
            )
            .await
            .unwrap();
        assert_eq!(outcome, DepositCommit::Credited);
    }

    #[tokio::test]
    async fn test_commit_withdrawal_debits_and_records() {
        let (repo, _temp) = setup_test_db().await;
        let user = seed_user(&repo, "ada@example.com", "ada", "100").await;

        let mut debited = user.clone();
        debited.balance = Decimal::from_str("40").unwrap();

        let withdrawal = Withdrawal::new(
            user.id.clone(),
            Decimal::from_str("60").unwrap(),
            "bc1qexample".to_string(),
            TimeMs::new(2000),
        );
        let record = Transaction::new(
            user.id.clone(),
            TransactionKind::Withdrawal,
            Decimal::from_str("60").unwrap(),
            None,
            None,
            TimeMs::new(2000),
        );

        assert!(repo
            .commit_withdrawal(&user, &debited, &withdrawal, &record)
            .await
            .unwrap());

        let stored = repo.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.balance.to_canonical_string(), "40");

        let withdrawals = repo.list_withdrawals(&user.id).await.unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].status, WithdrawalStatus::Pending);
    }

    #[tokio::test]
    async fn test_commit_referral_bonus_updates_edge_and_referrer() {
        let (repo, _temp) = setup_test_db().await;
        let referrer = seed_user(&repo, "ada@example.com", "ada", "0").await;
        let referee = seed_user(&repo, "bob@example.com", "bob", "0").await;

        let edge = crate::domain::ReferralEdge::new(
            referrer.id.clone(),
            referee.id.clone(),
            TimeMs::new(1500),
        );
        sqlx::query(
            "INSERT INTO referrals (id, referrer_id, referee_id, bonus_earned, created_at_ms) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&edge.id)
        .bind(edge.referrer_id.as_str())
        .bind(edge.referee_id.as_str())
        .bind(edge.bonus_earned.to_canonical_string())
        .bind(edge.created_at.as_ms())
        .execute(repo.pool())
        .await
        .unwrap();

        let mut credited = referrer.clone();
        credited.balance = Decimal::from_str("5").unwrap();
        credited.total_earned = Decimal::from_str("5").unwrap();

        let bonus = Decimal::from_str("5").unwrap();
        let record = Transaction::new(
            referrer.id.clone(),
            TransactionKind::ReferralBonus,
            bonus,
            None,
            None,
            TimeMs::new(2000),
        );

        assert!(repo
            .commit_referral_bonus(
                &referrer,
                &credited,
                &edge.id,
                &Decimal::zero(),
                &bonus,
                &record
            )
            .await
            .unwrap());

        let stored_edge = repo
            .get_referral_by_referee(&referee.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored_edge.bonus_earned.to_canonical_string(), "5");

        let stored = repo.get_user(&referrer.id).await.unwrap().unwrap();
        assert_eq!(stored.balance.to_canonical_string(), "5");
        assert_eq!(stored.total_earned.to_canonical_string(), "5");
    }

    #[tokio::test]
    async fn test_transactions_listed_newest_first() {
        let (repo, _temp) = setup_test_db().await;
        let user = seed_user(&repo, "ada@example.com", "ada", "0").await;

        let mut older = deposit_record(&user.id, "pay-1", "100");
        older.created_at = TimeMs::new(1000);
        let mut newer = deposit_record(&user.id, "pay-2", "200");
        newer.created_at = TimeMs::new(2000);

        repo.insert_transaction(&older).await.unwrap();
        repo.insert_transaction(&newer).await.unwrap();

        let listed = repo.list_transactions(&user.id).await.unwrap();
        assert_eq!(listed, vec![newer, older]);
    }
}
