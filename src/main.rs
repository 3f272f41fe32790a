use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_portal::{
    api::{create_router, AppState},
    config::Config,
    error::AppError,
    service::{LogMailer, Mailer, Services, SmtpMailer},
    storage::LocalBlobStore,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus_portal=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting campus portal v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_env()?);

    let db = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;
    tracing::info!("Database connected: {}", config.database_url);

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
    tracing::info!("Database migrations completed");

    let blobs = LocalBlobStore::new(
        PathBuf::from(&config.upload_dir),
        config.file_base_url.clone(),
    )
    .await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!("Mail relay: {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set; verification and reset mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let services = Services::new(db.clone(), &config, Arc::new(blobs), mailer);

    {
        let sweeper = services.sweeper.clone();
        let interval = Duration::from_secs(config.file_sweep_interval_secs.max(1));
        tokio::spawn(sweeper.run(interval));
        tracing::info!(
            "Sweeper started (every {:?}, grace {}s)",
            interval,
            config.file_sweep_grace_secs
        );
    }

    let state = AppState::new(db, config.clone(), services);
    let app = create_router(state);

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
