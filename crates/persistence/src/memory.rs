//! In-memory onboarding store.
//!
//! Used by the test suites and by `storage.backend = "memory"`. A unit of
//! work holds the store lock for its whole lifetime and mutates a private
//! copy of the state, which replaces the shared state on commit. Dropping
//! the unit of work discards the copy, so units of work are fully isolated
//! and serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{
    Account, Course, Invitation, InvitationFilter, InvitationState, RegistrationRequest,
    RequestFilter, RequestState, UsageEntry,
};
use domain::store::{
    AccountDirectory, CourseRoster, InvitationStore, OnboardingStore, OnboardingTx,
    RegistrationRequestStore,
};
use domain::StoreError;
use shared::pagination::PageRequest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    invitations: HashMap<Uuid, Invitation>,
    requests: HashMap<Uuid, RegistrationRequest>,
    accounts: HashMap<Uuid, Account>,
    courses: HashMap<Uuid, Course>,
}

/// Failures injected into account inserts.
#[derive(Debug, Clone, Default)]
struct FaultPlan {
    fail_account_email: Option<String>,
    account_insert_delay: Option<Duration>,
}

/// Shared in-memory store. Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<StdMutex<FaultPlan>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every account insert for `email` fail with a backend error.
    pub fn fail_account_insert_for(&self, email: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_account_email = Some(email.to_lowercase());
        }
    }

    /// Delays every account insert by `delay` while the unit of work is open.
    pub fn delay_account_inserts(&self, delay: Duration) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.account_insert_delay = Some(delay);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            *faults = FaultPlan::default();
        }
    }

    fn fault_plan(&self) -> FaultPlan {
        self.faults
            .lock()
            .map(|faults| faults.clone())
            .unwrap_or_default()
    }

    pub async fn seed_course(&self, course: Course) {
        self.state.lock().await.courses.insert(course.id, course);
    }

    pub async fn seed_account(&self, account: Account) {
        self.state.lock().await.accounts.insert(account.id, account);
    }

    pub async fn seed_invitation(&self, invitation: Invitation) {
        self.state
            .lock()
            .await
            .invitations
            .insert(invitation.id, invitation);
    }

    pub async fn invitation(&self, id: Uuid) -> Option<Invitation> {
        self.state.lock().await.invitations.get(&id).cloned()
    }

    pub async fn request(&self, id: Uuid) -> Option<RegistrationRequest> {
        self.state.lock().await.requests.get(&id).cloned()
    }

    pub async fn requests(&self) -> Vec<RegistrationRequest> {
        self.state.lock().await.requests.values().cloned().collect()
    }

    pub async fn course(&self, id: Uuid) -> Option<Course> {
        self.state.lock().await.courses.get(&id).cloned()
    }

    pub async fn account(&self, id: Uuid) -> Option<Account> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    pub async fn account_by_email(&self, email: &str) -> Option<Account> {
        let state = self.state.lock().await;
        state
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.state.lock().await.accounts.values().cloned().collect()
    }
}

#[async_trait]
impl OnboardingStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn OnboardingTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            faults: self.fault_plan(),
        }))
    }
}

/// Unit of work over [`InMemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: FaultPlan,
}

fn page_of<T>(mut items: Vec<T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = page.offset().min(total) as usize;
    let end = (offset + page.limit() as usize).min(items.len());
    let slice = items.drain(offset..end).collect();
    (slice, total)
}

#[async_trait]
impl InvitationStore for MemoryTx {
    async fn insert_invitation(&mut self, invitation: &Invitation) -> Result<(), StoreError> {
        if self
            .working
            .invitations
            .values()
            .any(|existing| existing.code == invitation.code)
        {
            return Err(StoreError::Conflict("invitations_code_unique".to_string()));
        }
        self.working
            .invitations
            .insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn find_invitation(&mut self, id: Uuid) -> Result<Option<Invitation>, StoreError> {
        Ok(self.working.invitations.get(&id).cloned())
    }

    async fn find_invitation_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        Ok(self
            .working
            .invitations
            .values()
            .find(|invitation| invitation.code == code)
            .cloned())
    }

    async fn invitation_code_exists(&mut self, code: &str) -> Result<bool, StoreError> {
        Ok(self
            .working
            .invitations
            .values()
            .any(|invitation| invitation.code == code))
    }

    async fn expire_invitation(&mut self, id: Uuid) -> Result<bool, StoreError> {
        match self.working.invitations.get_mut(&id) {
            Some(invitation) if !invitation.state.is_terminal() => {
                invitation.state = InvitationState::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_invitation(
        &mut self,
        id: Uuid,
        usage: &UsageEntry,
    ) -> Result<Option<Invitation>, StoreError> {
        let Some(invitation) = self.working.invitations.get_mut(&id) else {
            return Ok(None);
        };
        if invitation.apply_usage(usage.clone()) {
            Ok(Some(invitation.clone()))
        } else {
            Ok(None)
        }
    }

    async fn revoke_invitation(&mut self, id: Uuid) -> Result<bool, StoreError> {
        match self.working.invitations.get_mut(&id) {
            Some(invitation) if !invitation.state.is_terminal() => {
                invitation.state = InvitationState::Revoked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_invitations(
        &mut self,
        filter: &InvitationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Invitation>, u64), StoreError> {
        let mut matching: Vec<Invitation> = self
            .working
            .invitations
            .values()
            .filter(|inv| filter.school_id.map_or(true, |school| inv.school_id == school))
            .filter(|inv| filter.state.map_or(true, |state| inv.state == state))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(matching, page))
    }
}

#[async_trait]
impl RegistrationRequestStore for MemoryTx {
    async fn insert_request(&mut self, request: &RegistrationRequest) -> Result<(), StoreError> {
        if request.state == RequestState::Pending
            && self.working.requests.values().any(|existing| {
                existing.state == RequestState::Pending
                    && existing.school_id == request.school_id
                    && existing
                        .guardian
                        .email
                        .eq_ignore_ascii_case(&request.guardian.email)
            })
        {
            return Err(StoreError::Conflict(
                "registration_requests_one_pending".to_string(),
            ));
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_request(&mut self, id: Uuid) -> Result<Option<RegistrationRequest>, StoreError> {
        Ok(self.working.requests.get(&id).cloned())
    }

    async fn has_pending_request(
        &mut self,
        school_id: Uuid,
        guardian_email: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.working.requests.values().any(|request| {
            request.state == RequestState::Pending
                && request.school_id == school_id
                && request.guardian.email.eq_ignore_ascii_case(guardian_email)
        }))
    }

    async fn approve_request(
        &mut self,
        id: Uuid,
        reviewer_id: Uuid,
        reviewed_at: DateTime<Utc>,
        created_account_ids: &[Uuid],
    ) -> Result<bool, StoreError> {
        match self.working.requests.get_mut(&id) {
            Some(request) if request.state == RequestState::Pending => {
                request.state = RequestState::Approved;
                request.reviewer_id = Some(reviewer_id);
                request.reviewed_at = Some(reviewed_at);
                request.created_account_ids = created_account_ids.to_vec();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reject_request(
        &mut self,
        id: Uuid,
        reviewer_id: Uuid,
        reviewed_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError> {
        match self.working.requests.get_mut(&id) {
            Some(request) if request.state == RequestState::Pending => {
                request.state = RequestState::Rejected;
                request.reviewer_id = Some(reviewer_id);
                request.reviewed_at = Some(reviewed_at);
                request.comments = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_requests(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<(Vec<RegistrationRequest>, u64), StoreError> {
        let mut matching: Vec<RegistrationRequest> = self
            .working
            .requests
            .values()
            .filter(|req| filter.school_id.map_or(true, |school| req.school_id == school))
            .filter(|req| filter.state.map_or(true, |state| req.state == state))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(page_of(matching, page))
    }
}

#[async_trait]
impl AccountDirectory for MemoryTx {
    async fn find_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.working.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&mut self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .working
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if let Some(delay) = self.faults.account_insert_delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .faults
            .fail_account_email
            .as_deref()
            .is_some_and(|email| account.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Backend(format!(
                "injected failure inserting {}",
                account.email
            )));
        }
        if self
            .working
            .accounts
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(StoreError::Conflict("accounts_email_unique".to_string()));
        }
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn set_associated_students(
        &mut self,
        guardian_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let account = self
            .working
            .accounts
            .get_mut(&guardian_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", guardian_id)))?;
        account.associated_student_ids = student_ids.to_vec();
        Ok(())
    }
}

#[async_trait]
impl CourseRoster for MemoryTx {
    async fn find_course(&mut self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self.working.courses.get(&id).cloned())
    }

    async fn add_student_to_course(
        &mut self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, StoreError> {
        let course = self
            .working
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| StoreError::NotFound(format!("course {}", course_id)))?;
        if course.student_ids.contains(&student_id) {
            return Ok(false);
        }
        course.student_ids.push(student_id);
        Ok(true)
    }
}

#[async_trait]
impl OnboardingTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
