//! Common test utilities for integration tests.
//!
//! Most suites run the real service over the in-memory store, with mock
//! collaborators that record what would have been sent. [`PgTestContext`]
//! wires the same service to PostgreSQL through `TEST_DATABASE_URL`.

// Allow dead code in this module - not every suite uses every helper.
#![allow(dead_code)]

use axum::Router;
use chrono::{DateTime, Datelike, Utc};
use domain::models::{
    Account, AccountRole, Course, Invitation, InvitationKind, InvitationState,
    RegistrationRequest, SubmitRegistrationRequest,
};
use domain::services::{MockMailer, MockNotifier};
use domain::store::{
    AccountDirectory, CourseRoster, InvitationStore, OnboardingStore, RegistrationRequestStore,
};
use onboarding_api::{
    app::create_app,
    config::Config,
    services::{OnboardingService, OnboardingSettings},
};
use persistence::db::run_migrations;
use persistence::{InMemoryStore, PgOnboardingStore};
use shared::codes::generate_invitation_code;
use sqlx::{postgres::PgPoolOptions, PgPool};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const STUDENT_DOMAIN: &str = "students.test";

/// Settings used by the service-level suites.
pub fn test_settings() -> OnboardingSettings {
    OnboardingSettings {
        student_email_domain: STUDENT_DOMAIN.to_string(),
        password_length: 10,
        code_retry_budget: 10,
        operation_timeout: Duration::from_secs(10),
        default_page_size: 20,
        max_page_size: 100,
    }
}

/// A wired service plus handles on everything behind it.
pub struct TestContext {
    pub service: OnboardingService,
    pub store: InMemoryStore,
    pub mailer: MockMailer,
    pub notifier: MockNotifier,
    pub school_id: Uuid,
    pub admin_id: Uuid,
    pub course: Course,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with(MockMailer::new(), test_settings()).await
    }

    pub async fn with_settings(settings: OnboardingSettings) -> Self {
        Self::with(MockMailer::new(), settings).await
    }

    pub async fn with_mailer(mailer: MockMailer) -> Self {
        Self::with(mailer, test_settings()).await
    }

    async fn with(mailer: MockMailer, settings: OnboardingSettings) -> Self {
        let store = InMemoryStore::new();
        let notifier = MockNotifier::new();
        let service = OnboardingService::new(
            Arc::new(store.clone()),
            Arc::new(mailer.clone()),
            Arc::new(notifier.clone()),
            settings,
        );

        let school_id = Uuid::new_v4();
        let course = seed_course(&store, school_id, "Mathematics", "3rd Grade", "B").await;

        Self {
            service,
            store,
            mailer,
            notifier,
            school_id,
            admin_id: Uuid::new_v4(),
            course,
        }
    }

    /// Seeds an active course invitation with a fixed code.
    pub async fn course_invitation(&self, code: &str, max_uses: i32) -> Invitation {
        seed_invitation(
            &self.store,
            code,
            InvitationKind::Course,
            self.school_id,
            Some(self.course.id),
            None,
            max_uses,
            None,
        )
        .await
    }

    /// Builds an HTTP router over this context's service.
    pub fn router(&self) -> Router {
        let config = Config::load_for_test(&[]).expect("test config");
        create_app(config, self.service.clone(), None)
    }
}

pub async fn seed_course(
    store: &InMemoryStore,
    school_id: Uuid,
    name: &str,
    grade: &str,
    section: &str,
) -> Course {
    let course = Course {
        id: Uuid::new_v4(),
        school_id,
        name: name.to_string(),
        grade: grade.to_string(),
        section: section.to_string(),
        student_ids: vec![],
    };
    store.seed_course(course.clone()).await;
    course
}

pub async fn seed_student(
    store: &InMemoryStore,
    school_id: Uuid,
    name: &str,
    last_name: &str,
) -> Account {
    let account = Account {
        id: Uuid::new_v4(),
        school_id,
        role: AccountRole::Student,
        name: name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}.{}@{}", name, last_name, STUDENT_DOMAIN).to_lowercase(),
        phone: None,
        code: Some("S24-EXIST1".to_string()),
        password_hash: None,
        active: true,
        associated_student_ids: vec![],
        created_at: Utc::now(),
    };
    store.seed_account(account.clone()).await;
    account
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_invitation(
    store: &InMemoryStore,
    code: &str,
    kind: InvitationKind,
    school_id: Uuid,
    course_id: Option<Uuid>,
    student_id: Option<Uuid>,
    max_uses: i32,
    expires_at: Option<DateTime<Utc>>,
) -> Invitation {
    let invitation = Invitation {
        id: Uuid::new_v4(),
        code: code.to_string(),
        kind,
        school_id,
        course_id,
        student_id,
        state: InvitationState::Active,
        created_at: Utc::now(),
        expires_at,
        consumed_at: None,
        creator_id: Uuid::new_v4(),
        max_uses,
        uses_so_far: 0,
        usage_log: vec![],
        extra: None,
    };
    store.seed_invitation(invitation.clone()).await;
    invitation
}

/// A wired service over PostgreSQL plus direct handles on the database.
pub struct PgTestContext {
    pub service: OnboardingService,
    pub store: PgOnboardingStore,
    pub pool: PgPool,
    pub mailer: MockMailer,
    pub school_id: Uuid,
    pub admin_id: Uuid,
    pub course: Course,
}

impl PgTestContext {
    /// Connects through `TEST_DATABASE_URL` and applies migrations.
    ///
    /// Returns `None` when the variable is unset so the suite is skipped on
    /// machines without a database. Every context uses a fresh school id,
    /// so runs against the same database do not see each other's rows.
    pub async fn connect() -> Option<Self> {
        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let store = PgOnboardingStore::new(pool.clone());
        let mailer = MockMailer::new();
        let service = OnboardingService::new(
            Arc::new(store.clone()),
            Arc::new(mailer.clone()),
            Arc::new(MockNotifier::new()),
            test_settings(),
        );

        let school_id = Uuid::new_v4();
        let course = Course {
            id: Uuid::new_v4(),
            school_id,
            name: "Mathematics".to_string(),
            grade: "3rd Grade".to_string(),
            section: "B".to_string(),
            student_ids: vec![],
        };
        sqlx::query(
            "INSERT INTO courses (id, school_id, name, grade, section) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(course.id)
        .bind(course.school_id)
        .bind(&course.name)
        .bind(&course.grade)
        .bind(&course.section)
        .execute(&pool)
        .await
        .expect("Failed to seed course");

        Some(Self {
            service,
            store,
            pool,
            mailer,
            school_id,
            admin_id: Uuid::new_v4(),
            course,
        })
    }

    /// Inserts an active course invitation with a freshly generated code.
    pub async fn course_invitation(
        &self,
        max_uses: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Invitation {
        let code = generate_invitation_code("PG", Utc::now().year()).expect("valid prefix");
        let invitation = Invitation {
            id: Uuid::new_v4(),
            code,
            kind: InvitationKind::Course,
            school_id: self.school_id,
            course_id: Some(self.course.id),
            student_id: None,
            state: InvitationState::Active,
            created_at: Utc::now(),
            expires_at,
            consumed_at: None,
            creator_id: self.admin_id,
            max_uses,
            uses_so_far: 0,
            usage_log: vec![],
            extra: None,
        };

        let mut tx = self.store.begin().await.expect("begin");
        tx.insert_invitation(&invitation)
            .await
            .expect("insert invitation");
        tx.commit().await.expect("commit");
        invitation
    }

    /// Inserts a student account directly, outside any service call.
    pub async fn insert_student(&self, school_id: Uuid, email: &str) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            school_id,
            role: AccountRole::Student,
            name: "Blocking".to_string(),
            last_name: "Student".to_string(),
            email: email.to_string(),
            phone: None,
            code: None,
            password_hash: None,
            active: true,
            associated_student_ids: vec![],
            created_at: Utc::now(),
        };

        let mut tx = self.store.begin().await.expect("begin");
        tx.insert_account(&account).await.expect("insert account");
        tx.commit().await.expect("commit");
        account
    }

    pub async fn delete_account(&self, id: Uuid) {
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .expect("delete account");
    }

    pub async fn invitation(&self, id: Uuid) -> Invitation {
        let mut tx = self.store.begin().await.expect("begin");
        tx.find_invitation(id)
            .await
            .expect("find invitation")
            .expect("invitation exists")
    }

    pub async fn request(&self, id: Uuid) -> RegistrationRequest {
        let mut tx = self.store.begin().await.expect("begin");
        tx.find_request(id)
            .await
            .expect("find request")
            .expect("request exists")
    }

    /// Current roster of the context's course.
    pub async fn roster(&self) -> Vec<Uuid> {
        let mut tx = self.store.begin().await.expect("begin");
        tx.find_course(self.course.id)
            .await
            .expect("find course")
            .expect("course exists")
            .student_ids
    }

    /// Accounts created for this context's school.
    pub async fn account_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE school_id = $1")
            .bind(self.school_id)
            .fetch_one(&self.pool)
            .await
            .expect("count accounts")
    }

    /// Requests stored for this context's school.
    pub async fn request_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM registration_requests WHERE school_id = $1")
            .bind(self.school_id)
            .fetch_one(&self.pool)
            .await
            .expect("count requests")
    }
}

/// A new-student entry with no email or code supplied.
pub fn student_json(name: &str, last_name: &str, course_id: Uuid) -> Value {
    json!({
        "name": name,
        "last_name": last_name,
        "birth_date": "2016-03-14",
        "course_id": course_id.to_string()
    })
}

/// A new-student entry with a random realistic name.
pub fn random_student(course_id: Uuid) -> Value {
    use fake::faker::name::en::{FirstName, LastName};
    use fake::Fake;

    let name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    student_json(&name, &last_name, course_id)
}

pub fn submission_json(code: &str, guardian_email: &str, students: Vec<Value>) -> Value {
    json!({
        "invitation_code": code,
        "guardian": {
            "name": "Ana",
            "last_name": "Perez",
            "email": guardian_email,
            "phone": "+34 600 000 000"
        },
        "students": students
    })
}

pub fn submission(code: &str, guardian_email: &str, students: Vec<Value>) -> SubmitRegistrationRequest {
    serde_json::from_value(submission_json(code, guardian_email, students))
        .expect("valid submission payload")
}

/// Generate a unique guardian email for testing.
pub fn unique_guardian_email() -> String {
    format!("guardian_{}@example.com", Uuid::new_v4().simple())
}

/// Build a JSON request.
pub fn json_request(
    method: axum::http::Method,
    uri: &str,
    body: Value,
) -> axum::http::Request<axum::body::Body> {
    use axum::{
        body::Body,
        http::{header, Request},
    };

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a GET request.
pub fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
    use axum::{
        body::Body,
        http::{Method, Request},
    };

    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}
