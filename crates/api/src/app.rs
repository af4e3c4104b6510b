use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, invitations, registration_requests};
use crate::services::OnboardingService;

#[derive(Clone)]
pub struct AppState {
    pub service: OnboardingService,
    pub config: Arc<Config>,
    /// Present only when the PostgreSQL backend is in use.
    pub pool: Option<PgPool>,
}

pub fn create_app(config: Config, service: OnboardingService, pool: Option<PgPool>) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        service,
        config: config.clone(),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public onboarding routes: guardians validate codes and submit requests
    let onboarding_routes = Router::new()
        .route(
            "/api/v1/invitations/:code",
            get(invitations::validate_code),
        )
        .route(
            "/api/v1/registration-requests",
            post(registration_requests::submit_request),
        );

    // Administrative routes. Reviewer identity travels in the body.
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/invitations",
            post(invitations::create_invitation).get(invitations::list_invitations),
        )
        .route(
            "/api/v1/admin/invitations/:invitation_id/revoke",
            post(invitations::revoke_invitation),
        )
        .route(
            "/api/v1/admin/registration-requests",
            get(registration_requests::list_history),
        )
        .route(
            "/api/v1/admin/registration-requests/pending",
            get(registration_requests::list_pending),
        )
        .route(
            "/api/v1/admin/registration-requests/:request_id",
            get(registration_requests::get_request),
        )
        .route(
            "/api/v1/admin/registration-requests/:request_id/approve",
            post(registration_requests::approve_request),
        )
        .route(
            "/api/v1/admin/registration-requests/:request_id/reject",
            post(registration_requests::reject_request),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(onboarding_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
