//! PostgreSQL-backed unit of work.

use async_trait::async_trait;
use domain::store::{OnboardingStore, OnboardingTx};
use domain::StoreError;
use sqlx::{PgPool, Postgres, Transaction};

use crate::metrics::record_pool_metrics;

/// PostgreSQL unique_violation.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign_key_violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Classifies a driver error into the store error buckets.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound("Row not found".to_string()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => StoreError::Conflict(
                db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string()),
            ),
            Some(FOREIGN_KEY_VIOLATION) => StoreError::NotFound(
                db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string()),
            ),
            _ => StoreError::Backend(err.to_string()),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Opens PostgreSQL transactions as onboarding units of work.
#[derive(Clone)]
pub struct PgOnboardingStore {
    pool: PgPool,
}

impl PgOnboardingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OnboardingStore for PgOnboardingStore {
    async fn begin(&self) -> Result<Box<dyn OnboardingTx>, StoreError> {
        record_pool_metrics(&self.pool);
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgOnboardingTx { tx }))
    }
}

/// One open PostgreSQL transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PgOnboardingTx {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OnboardingTx for PgOnboardingTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}
