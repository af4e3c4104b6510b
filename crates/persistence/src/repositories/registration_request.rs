//! Registration request store on PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{RegistrationRequest, RequestFilter};
use domain::store::RegistrationRequestStore;
use domain::StoreError;
use shared::pagination::PageRequest;
use sqlx::types::Json;
use uuid::Uuid;

use crate::entities::{RegistrationRequestEntity, RequestStateDb};
use crate::metrics::QueryTimer;
use crate::postgres::{map_sqlx_error, PgOnboardingTx};

const REQUEST_COLUMNS: &str = "id, invitation_id, school_id, guardian_name, guardian_last_name, \
     guardian_email, guardian_phone, students, state, submitted_at, reviewed_at, reviewer_id, \
     comments, created_account_ids";

#[async_trait]
impl RegistrationRequestStore for PgOnboardingTx {
    async fn insert_request(&mut self, request: &RegistrationRequest) -> Result<(), StoreError> {
        // registration_requests_one_pending turns a concurrent duplicate into 23505.
        let timer = QueryTimer::new("insert_registration_request");
        let result = sqlx::query(
            r#"
            INSERT INTO registration_requests (
                id, invitation_id, school_id, guardian_name, guardian_last_name,
                guardian_email, guardian_phone, students, state, submitted_at,
                reviewed_at, reviewer_id, comments, created_account_ids
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(request.id)
        .bind(request.invitation_id)
        .bind(request.school_id)
        .bind(&request.guardian.name)
        .bind(&request.guardian.last_name)
        .bind(&request.guardian.email)
        .bind(&request.guardian.phone)
        .bind(Json(&request.students))
        .bind(RequestStateDb::from(request.state))
        .bind(request.submitted_at)
        .bind(request.reviewed_at)
        .bind(request.reviewer_id)
        .bind(&request.comments)
        .bind(&request.created_account_ids)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result.map(|_| ()).map_err(map_sqlx_error)
    }

    async fn find_request(&mut self, id: Uuid) -> Result<Option<RegistrationRequest>, StoreError> {
        let timer = QueryTimer::new("find_registration_request");
        let result = sqlx::query_as::<_, RegistrationRequestEntity>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM registration_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|entity| entity.map(RegistrationRequest::from))
            .map_err(map_sqlx_error)
    }

    async fn has_pending_request(
        &mut self,
        school_id: Uuid,
        guardian_email: &str,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("has_pending_registration_request");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM registration_requests
                WHERE school_id = $1 AND LOWER(guardian_email) = LOWER($2) AND state = 'PENDING'
            )
            "#,
        )
        .bind(school_id)
        .bind(guardian_email)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        result.map_err(map_sqlx_error)
    }

    async fn approve_request(
        &mut self,
        id: Uuid,
        reviewer_id: Uuid,
        reviewed_at: DateTime<Utc>,
        created_account_ids: &[Uuid],
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("approve_registration_request");
        let result = sqlx::query(
            r#"
            UPDATE registration_requests
            SET state = 'APPROVED', reviewer_id = $2, reviewed_at = $3, created_account_ids = $4
            WHERE id = $1 AND state = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(reviewer_id)
        .bind(reviewed_at)
        .bind(created_account_ids)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|done| done.rows_affected() == 1)
            .map_err(map_sqlx_error)
    }

    async fn reject_request(
        &mut self,
        id: Uuid,
        reviewer_id: Uuid,
        reviewed_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("reject_registration_request");
        let result = sqlx::query(
            r#"
            UPDATE registration_requests
            SET state = 'REJECTED', reviewer_id = $2, reviewed_at = $3, comments = $4
            WHERE id = $1 AND state = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(reviewer_id)
        .bind(reviewed_at)
        .bind(reason)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|done| done.rows_affected() == 1)
            .map_err(map_sqlx_error)
    }

    async fn list_requests(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<(Vec<RegistrationRequest>, u64), StoreError> {
        let state = filter.state.map(RequestStateDb::from);

        let timer = QueryTimer::new("count_registration_requests");
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM registration_requests
            WHERE ($1::uuid IS NULL OR school_id = $1)
              AND ($2::request_state IS NULL OR state = $2)
            "#,
        )
        .bind(filter.school_id)
        .bind(state)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        let total = total.map_err(map_sqlx_error)?;

        let timer = QueryTimer::new("list_registration_requests");
        let rows = sqlx::query_as::<_, RegistrationRequestEntity>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM registration_requests
            WHERE ($1::uuid IS NULL OR school_id = $1)
              AND ($2::request_state IS NULL OR state = $2)
            ORDER BY submitted_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.school_id)
        .bind(state)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        let rows = rows.map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(RegistrationRequest::from).collect(),
            total.max(0) as u64,
        ))
    }
}
