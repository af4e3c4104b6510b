//! Account directory on PostgreSQL.

use async_trait::async_trait;
use domain::models::Account;
use domain::store::AccountDirectory;
use domain::StoreError;
use uuid::Uuid;

use crate::entities::{AccountEntity, AccountRoleDb};
use crate::metrics::QueryTimer;
use crate::postgres::{map_sqlx_error, PgOnboardingTx};

const ACCOUNT_COLUMNS: &str = "id, school_id, role, name, last_name, email, phone, code, \
     password_hash, active, associated_student_ids, created_at";

#[async_trait]
impl AccountDirectory for PgOnboardingTx {
    async fn find_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let timer = QueryTimer::new("find_account_by_id");
        let result = sqlx::query_as::<_, AccountEntity>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|entity| entity.map(Account::from))
            .map_err(map_sqlx_error)
    }

    async fn find_account_by_email(&mut self, email: &str) -> Result<Option<Account>, StoreError> {
        let timer = QueryTimer::new("find_account_by_email");
        let result = sqlx::query_as::<_, AccountEntity>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|entity| entity.map(Account::from))
            .map_err(map_sqlx_error)
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        let timer = QueryTimer::new("insert_account");
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                id, school_id, role, name, last_name, email, phone, code,
                password_hash, active, associated_student_ids, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(account.id)
        .bind(account.school_id)
        .bind(AccountRoleDb::from(account.role))
        .bind(&account.name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.code)
        .bind(&account.password_hash)
        .bind(account.active)
        .bind(&account.associated_student_ids)
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result.map(|_| ()).map_err(map_sqlx_error)
    }

    async fn set_associated_students(
        &mut self,
        guardian_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let timer = QueryTimer::new("set_associated_students");
        let result = sqlx::query("UPDATE accounts SET associated_student_ids = $2 WHERE id = $1")
            .bind(guardian_id)
            .bind(student_ids)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        match result.map_err(map_sqlx_error)?.rows_affected() {
            0 => Err(StoreError::NotFound(format!("account {}", guardian_id))),
            _ => Ok(()),
        }
    }
}
