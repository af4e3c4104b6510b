//! Invitation store on PostgreSQL.

use async_trait::async_trait;
use domain::models::{Invitation, InvitationFilter, UsageEntry};
use domain::store::InvitationStore;
use domain::StoreError;
use shared::pagination::PageRequest;
use uuid::Uuid;

use crate::entities::{
    AccountRoleDb, InvitationEntity, InvitationKindDb, InvitationStateDb, InvitationUsageEntity,
};
use crate::metrics::QueryTimer;
use crate::postgres::{map_sqlx_error, PgOnboardingTx};

const INVITATION_COLUMNS: &str = "id, code, kind, school_id, course_id, student_id, state, \
     created_at, expires_at, consumed_at, creator_id, max_uses, uses_so_far, extra";

impl PgOnboardingTx {
    async fn load_usages(&mut self, invitation_id: Uuid) -> Result<Vec<InvitationUsageEntity>, StoreError> {
        let timer = QueryTimer::new("load_invitation_usages");
        let result = sqlx::query_as::<_, InvitationUsageEntity>(
            r#"
            SELECT invitation_id, account_id, account_role, used_at
            FROM invitation_usages
            WHERE invitation_id = $1
            ORDER BY id
            "#,
        )
        .bind(invitation_id)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        result.map_err(map_sqlx_error)
    }

    async fn hydrate(&mut self, entity: Option<InvitationEntity>) -> Result<Option<Invitation>, StoreError> {
        match entity {
            Some(entity) => {
                let usages = self.load_usages(entity.id).await?;
                Ok(Some(entity.into_domain(usages)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InvitationStore for PgOnboardingTx {
    async fn insert_invitation(&mut self, invitation: &Invitation) -> Result<(), StoreError> {
        let timer = QueryTimer::new("insert_invitation");
        let result = sqlx::query(
            r#"
            INSERT INTO invitations (
                id, code, kind, school_id, course_id, student_id, state,
                created_at, expires_at, consumed_at, creator_id, max_uses, uses_so_far, extra
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(invitation.id)
        .bind(&invitation.code)
        .bind(InvitationKindDb::from(invitation.kind))
        .bind(invitation.school_id)
        .bind(invitation.course_id)
        .bind(invitation.student_id)
        .bind(InvitationStateDb::from(invitation.state))
        .bind(invitation.created_at)
        .bind(invitation.expires_at)
        .bind(invitation.consumed_at)
        .bind(invitation.creator_id)
        .bind(invitation.max_uses)
        .bind(invitation.uses_so_far)
        .bind(&invitation.extra)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result.map(|_| ()).map_err(map_sqlx_error)
    }

    async fn find_invitation(&mut self, id: Uuid) -> Result<Option<Invitation>, StoreError> {
        let timer = QueryTimer::new("find_invitation_by_id");
        let result = sqlx::query_as::<_, InvitationEntity>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        let entity = result.map_err(map_sqlx_error)?;
        self.hydrate(entity).await
    }

    async fn find_invitation_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let timer = QueryTimer::new("find_invitation_by_code");
        let result = sqlx::query_as::<_, InvitationEntity>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        let entity = result.map_err(map_sqlx_error)?;
        self.hydrate(entity).await
    }

    async fn invitation_code_exists(&mut self, code: &str) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("invitation_code_exists");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM invitations WHERE code = $1)",
        )
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        result.map_err(map_sqlx_error)
    }

    async fn expire_invitation(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("expire_invitation");
        let result = sqlx::query(
            "UPDATE invitations SET state = 'EXPIRED' WHERE id = $1 AND state = 'ACTIVE'",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|done| done.rows_affected() == 1)
            .map_err(map_sqlx_error)
    }

    async fn consume_invitation(
        &mut self,
        id: Uuid,
        usage: &UsageEntry,
    ) -> Result<Option<Invitation>, StoreError> {
        // The guard is re-evaluated after any row lock wait, so two racing
        // consumers can never both take the last use.
        let timer = QueryTimer::new("consume_invitation");
        let result = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            UPDATE invitations
            SET uses_so_far = uses_so_far + 1,
                state = CASE WHEN uses_so_far + 1 >= max_uses
                             THEN 'CONSUMED'::invitation_state ELSE state END,
                consumed_at = CASE WHEN uses_so_far + 1 >= max_uses
                                   THEN $2 ELSE consumed_at END
            WHERE id = $1
              AND state = 'ACTIVE'
              AND uses_so_far < max_uses
              AND (expires_at IS NULL OR expires_at > $2)
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(usage.used_at)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        let Some(entity) = result.map_err(map_sqlx_error)? else {
            return Ok(None);
        };

        let timer = QueryTimer::new("insert_invitation_usage");
        let result = sqlx::query(
            r#"
            INSERT INTO invitation_usages (invitation_id, account_id, account_role, used_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(usage.account_id)
        .bind(AccountRoleDb::from(usage.account_role))
        .bind(usage.used_at)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result.map_err(map_sqlx_error)?;

        self.hydrate(Some(entity)).await
    }

    async fn revoke_invitation(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("revoke_invitation");
        let result = sqlx::query(
            "UPDATE invitations SET state = 'REVOKED' WHERE id = $1 AND state = 'ACTIVE'",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|done| done.rows_affected() == 1)
            .map_err(map_sqlx_error)
    }

    async fn list_invitations(
        &mut self,
        filter: &InvitationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Invitation>, u64), StoreError> {
        let state = filter.state.map(InvitationStateDb::from);

        let timer = QueryTimer::new("count_invitations");
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE ($1::uuid IS NULL OR school_id = $1)
              AND ($2::invitation_state IS NULL OR state = $2)
            "#,
        )
        .bind(filter.school_id)
        .bind(state)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        let total = total.map_err(map_sqlx_error)?;

        let timer = QueryTimer::new("list_invitations");
        let rows = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            SELECT {INVITATION_COLUMNS} FROM invitations
            WHERE ($1::uuid IS NULL OR school_id = $1)
              AND ($2::invitation_state IS NULL OR state = $2)
            ORDER BY created_at DESC, id
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

        let mut invitations = Vec::with_capacity(rows.len());
        for entity in rows {
            let usages = self.load_usages(entity.id).await?;
            invitations.push(entity.into_domain(usages));
        }
        Ok((invitations, total.max(0) as u64))
    }
}
