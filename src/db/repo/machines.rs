//! Machine reads and the purchase/claim commit paths.

use super::{parse_decimal_field, Repository};
use crate::domain::{Machine, MachineId, TimeMs, Transaction, User, UserId};
use sqlx::Row;

impl Repository {
    /// Insert a machine row directly (tests and admin tooling; purchases go
    /// through `commit_purchase`).
    pub async fn insert_machine(&self, machine: &Machine) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        insert_machine_stmt(&mut tx, machine).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fetch a machine by id.
    pub async fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM machines WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| parse_machine_row(&r)))
    }

    /// All machines owned by a user, oldest purchase first.
    pub async fn list_machines(&self, user_id: &UserId) -> Result<Vec<Machine>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM machines WHERE user_id = ? ORDER BY purchased_at_ms ASC, id ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(parse_machine_row).collect())
    }

    /// Commit a purchase atomically: debit the buyer (guarded by a balance
    /// compare-and-swap), insert the machine, and record the transaction.
    ///
    /// Returns false without any mutation when the buyer's row changed since
    /// `old_user` was read; the caller re-reads and retries through the
    /// ledger.
    pub async fn commit_purchase(
        &self,
        old_user: &User,
        new_user: &User,
        machine: &Machine,
        record: &Transaction,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = ?, total_invested = ?
            WHERE id = ? AND balance = ? AND total_invested = ?
            "#,
        )
        .bind(new_user.balance.to_canonical_string())
        .bind(new_user.total_invested.to_canonical_string())
        .bind(old_user.id.as_str())
        .bind(old_user.balance.to_canonical_string())
        .bind(old_user.total_invested.to_canonical_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        insert_machine_stmt(&mut tx, machine).await?;
        insert_transaction_stmt(&mut tx, record).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Commit a claim atomically.
    ///
    /// The machine update is conditional on the earnings and claim timestamp
    /// the settlement was computed from, and deliberately requires
    /// `current_earnings < max_earnings` inside the predicate as well — two
    /// concurrent claims can therefore never both credit. The owner's credit
    /// is a second compare-and-swap in the same transaction; losing either
    /// race rolls the whole commit back.
    pub async fn commit_claim(
        &self,
        old_machine: &Machine,
        new_machine: &Machine,
        old_user: &User,
        new_user: &User,
        record: &Transaction,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE machines
            SET current_earnings = ?, last_claimed_at_ms = ?, is_active = ?
            WHERE id = ? AND user_id = ? AND is_active = 1
              AND current_earnings = ? AND last_claimed_at_ms = ?
              AND CAST(current_earnings AS REAL) < CAST(max_earnings AS REAL)
            "#,
        )
        .bind(new_machine.current_earnings.to_canonical_string())
        .bind(new_machine.last_claimed_at.as_ms())
        .bind(new_machine.is_active as i64)
        .bind(old_machine.id.as_str())
        .bind(old_machine.user_id.as_str())
        .bind(old_machine.current_earnings.to_canonical_string())
        .bind(old_machine.last_claimed_at.as_ms())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = ?, total_earned = ?
            WHERE id = ? AND balance = ? AND total_earned = ?
            "#,
        )
        .bind(new_user.balance.to_canonical_string())
        .bind(new_user.total_earned.to_canonical_string())
        .bind(old_user.id.as_str())
        .bind(old_user.balance.to_canonical_string())
        .bind(old_user.total_earned.to_canonical_string())
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

pub(super) async fn insert_machine_stmt(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    machine: &Machine,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO machines
        (id, user_id, template_id, name, investment_amount, reward_amount,
         claim_interval_ms, last_claimed_at_ms, current_earnings, max_earnings,
         is_active, purchased_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(machine.id.as_str())
    .bind(machine.user_id.as_str())
    .bind(machine.template_id.as_deref())
    .bind(&machine.name)
    .bind(machine.investment_amount.to_canonical_string())
    .bind(machine.reward_amount.to_canonical_string())
    .bind(machine.claim_interval_ms)
    .bind(machine.last_claimed_at.as_ms())
    .bind(machine.current_earnings.to_canonical_string())
    .bind(machine.max_earnings.to_canonical_string())
    .bind(machine.is_active as i64)
    .bind(machine.purchased_at.as_ms())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(super) async fn insert_transaction_stmt(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record: &Transaction,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (id, user_id, kind, amount, payment_id, machine_id, created_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&record.id)
    .bind(record.user_id.as_str())
    .bind(record.kind.as_str())
    .bind(record.amount.to_canonical_string())
    .bind(record.payment_id.as_deref())
    .bind(record.machine_id.as_ref().map(|id| id.as_str().to_string()))
    .bind(record.created_at.as_ms())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

fn parse_machine_row(row: &sqlx::sqlite::SqliteRow) -> Machine {
    let investment: String = row.get("investment_amount");
    let reward: String = row.get("reward_amount");
    let earnings: String = row.get("current_earnings");
    let max_earnings: String = row.get("max_earnings");
    let is_active: i64 = row.get("is_active");

    Machine {
        id: MachineId::new(row.get("id")),
        user_id: UserId::new(row.get("user_id")),
        template_id: row.get("template_id"),
        name: row.get("name"),
        investment_amount: parse_decimal_field(&investment, "machines.investment_amount"),
        reward_amount: parse_decimal_field(&reward, "machines.reward_amount"),
        claim_interval_ms: row.get("claim_interval_ms"),
        last_claimed_at: TimeMs::new(row.get("last_claimed_at_ms")),
        current_earnings: parse_decimal_field(&earnings, "machines.current_earnings"),
        max_earnings: parse_decimal_field(&max_earnings, "machines.max_earnings"),
        is_active: is_active != 0,
        purchased_at: TimeMs::new(row.get("purchased_at_ms")),
    }
}
