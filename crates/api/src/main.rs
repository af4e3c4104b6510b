use anyhow::{Context, Result};
use domain::services::{Mailer, Notifier};
use domain::store::OnboardingStore;
use persistence::{InMemoryStore, PgOnboardingStore};
use std::sync::Arc;
use tracing::{info, warn};

use onboarding_api::app;
use onboarding_api::config::{Config, StorageBackend};
use onboarding_api::middleware;
use onboarding_api::services::{EmailService, LogNotifier, OnboardingService, OnboardingSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;

    middleware::logging::init_logging(&config.logging)
        .context("failed to initialize logging")?;

    info!("Starting School Onboarding API v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = middleware::init_metrics() {
        warn!(error = %e, "Prometheus recorder not installed; /metrics will be unavailable");
    }

    let (store, pool): (Arc<dyn OnboardingStore>, _) = match config.storage.backend {
        StorageBackend::Postgres => {
            let db_config = persistence::db::DatabaseConfig::from(&config.database);
            let pool = persistence::db::create_pool(&db_config)
                .await
                .context("failed to connect to the database")?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool).await?;
            info!("Migrations completed");

            (Arc::new(PgOnboardingStore::new(pool.clone())), Some(pool))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; onboarding state is lost on restart");
            (Arc::new(InMemoryStore::new()), None)
        }
    };

    let mailer: Arc<dyn Mailer> = Arc::new(EmailService::new(config.email.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(
        &config.onboarding.admin_notification_email,
    ));
    let service = OnboardingService::new(
        store,
        mailer,
        notifier,
        OnboardingSettings::from(&config.onboarding),
    );

    let addr = config.socket_addr().context("invalid server address")?;
    let app = app::create_app(config, service, pool);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
