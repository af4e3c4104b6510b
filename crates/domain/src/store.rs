//! Persistence ports.
//!
//! Every read and write of onboarding state goes through a unit of work
//! ([`OnboardingTx`]) obtained from an [`OnboardingStore`]. Nothing a unit of
//! work does is visible to others until [`OnboardingTx::commit`]; dropping it
//! without committing discards everything, which is also what happens when a
//! caller's deadline cancels the future that owns it.
//!
//! Conditional transitions (`consume_invitation`, `revoke_invitation`,
//! `approve_request`, ...) are compare-and-swap style: they only apply when
//! the entity is still in the expected state and report whether they did.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use shared::pagination::PageRequest;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    Account, Course, Invitation, InvitationFilter, RegistrationRequest, RequestFilter, UsageEntry,
};

/// Invitation persistence.
#[async_trait]
pub trait InvitationStore {
    /// Inserts a new invitation. Fails with `Conflict` when the code is taken.
    async fn insert_invitation(&mut self, invitation: &Invitation) -> Result<(), StoreError>;

    async fn find_invitation(&mut self, id: Uuid) -> Result<Option<Invitation>, StoreError>;

    async fn find_invitation_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<Invitation>, StoreError>;

    async fn invitation_code_exists(&mut self, code: &str) -> Result<bool, StoreError>;

    /// Moves an `ACTIVE` invitation to `EXPIRED`. Returns `false` if it was not active.
    async fn expire_invitation(&mut self, id: Uuid) -> Result<bool, StoreError>;

    /// Records one use, guarded by `state = ACTIVE AND uses_so_far < max_uses`
    /// and an unexpired deadline at `usage.used_at`.
    ///
    /// Flips the state to `CONSUMED` when the cap is reached. Returns the
    /// updated invitation, or `None` when the guard did not hold.
    async fn consume_invitation(
        &mut self,
        id: Uuid,
        usage: &UsageEntry,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Moves an `ACTIVE` invitation to `REVOKED`. Returns `false` if it was not active.
    async fn revoke_invitation(&mut self, id: Uuid) -> Result<bool, StoreError>;

    /// Lists invitations newest first, with the total matching count.
    async fn list_invitations(
        &mut self,
        filter: &InvitationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Invitation>, u64), StoreError>;
}

/// Registration request persistence.
#[async_trait]
pub trait RegistrationRequestStore {
    /// Inserts a new request. Fails with `Conflict` when a pending request
    /// already exists for the same guardian email in the same school.
    async fn insert_request(&mut self, request: &RegistrationRequest) -> Result<(), StoreError>;

    async fn find_request(&mut self, id: Uuid) -> Result<Option<RegistrationRequest>, StoreError>;

    async fn has_pending_request(
        &mut self,
        school_id: Uuid,
        guardian_email: &str,
    ) -> Result<bool, StoreError>;

    /// Moves a `PENDING` request to `APPROVED`. Returns `false` if it was not pending.
    async fn approve_request(
        &mut self,
        id: Uuid,
        reviewer_id: Uuid,
        reviewed_at: DateTime<Utc>,
        created_account_ids: &[Uuid],
    ) -> Result<bool, StoreError>;

    /// Moves a `PENDING` request to `REJECTED`. Returns `false` if it was not pending.
    async fn reject_request(
        &mut self,
        id: Uuid,
        reviewer_id: Uuid,
        reviewed_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError>;

    /// Lists requests newest first, with the total matching count.
    async fn list_requests(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<(Vec<RegistrationRequest>, u64), StoreError>;
}

/// Account directory.
#[async_trait]
pub trait AccountDirectory {
    async fn find_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Looks an account up by email, case-insensitively.
    async fn find_account_by_email(&mut self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Inserts an account. Fails with `Conflict` when the email is taken.
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Replaces a guardian's associated-students list. Fails with `NotFound`
    /// when the account does not exist.
    async fn set_associated_students(
        &mut self,
        guardian_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<(), StoreError>;
}

/// Course roster.
#[async_trait]
pub trait CourseRoster {
    async fn find_course(&mut self, id: Uuid) -> Result<Option<Course>, StoreError>;

    /// Adds a student to a course roster as a set-add.
    ///
    /// Returns `true` if the student was added, `false` if already a member.
    /// Fails with `NotFound` when the course does not exist.
    async fn add_student_to_course(
        &mut self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, StoreError>;
}

/// A unit of work spanning every onboarding collection.
#[async_trait]
pub trait OnboardingTx:
    InvitationStore + RegistrationRequestStore + AccountDirectory + CourseRoster + Send
{
    /// Makes every change of this unit of work visible at once.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discards every change. Dropping the unit of work has the same effect.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Source of units of work.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OnboardingTx>, StoreError>;
}

/// Runs `f` inside a unit of work, committing on `Ok` and rolling back on `Err`.
///
/// The closure must not capture borrowed state; move owned values in.
///
/// ```ignore
/// let revoked = in_transaction(store, move |tx| {
///     Box::pin(async move { Ok::<_, OnboardingError>(tx.revoke_invitation(id).await?) })
/// })
/// .await?;
/// ```
pub async fn in_transaction<T, E, F>(store: &dyn OnboardingStore, f: F) -> Result<T, E>
where
    T: Send,
    E: From<StoreError> + Send,
    F: for<'a> FnOnce(&'a mut dyn OnboardingTx) -> BoxFuture<'a, Result<T, E>> + Send,
{
    let mut tx = store.begin().await?;
    match f(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
