use identity_service::{
    build_router,
    config::{AuthConfig, Environment, MailDriver},
    services::{LogMailer, Mailer, SmtpMailer},
    store::MemoryStore,
    AppState,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.environment == Environment::Prod,
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    // The datastore is an external collaborator behind the AuthStore trait;
    // this binary ships with the in-memory backend.
    let store = Arc::new(MemoryStore::new());
    tracing::info!("In-memory store initialized");

    let mailer: Arc<dyn Mailer> = match config.mail.driver {
        MailDriver::Smtp => Arc::new(SmtpMailer::new(&config.mail).map_err(|e| {
            service_core::error::AppError::ConfigError(anyhow::anyhow!(
                "failed to initialize SMTP mailer: {}",
                e
            ))
        })?),
        MailDriver::Log => Arc::new(LogMailer),
    };
    tracing::info!(driver = ?config.mail.driver, "Mailer initialized");

    let state = AppState::new(config.clone(), store, mailer);

    // Periodic sweep of expired token records.
    let purge_tokens = state.tokens.clone();
    let purge_interval = config.token_purge_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(purge_interval.max(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            match purge_tokens.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired tokens purged"),
                Err(e) => tracing::warn!(error = %e, "token purge failed"),
            }
        }
    });

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
