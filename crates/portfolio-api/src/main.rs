use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use portfolio_api::config::Settings;
use portfolio_api::services::email_service::MailTransport;
use portfolio_api::services::SmtpMailer;
use portfolio_api::storage::{DbPool, MemoryStore, PgStore};
use portfolio_api::{build_router, logging, AppState, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logger()?;

    info!("🚀 Starting Portfolio API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    // Storage
    let mut db_pool = None;
    let stores = match settings.database.url.as_deref() {
        Some(url) => {
            let pool = DbPool::new(url, &settings.database).await?;
            let store = Arc::new(PgStore::new(pool.clone()));
            store.ensure_schema().await?;
            info!("✅ Database connection established");
            db_pool = Some(pool);
            Stores::shared(store)
        }
        None => {
            warn!("No database configured, using in-memory storage");
            Stores::shared(Arc::new(MemoryStore::new()))
        }
    };

    // Email
    let mailer: Option<Arc<dyn MailTransport>> = match settings.email.credentials() {
        Some((user, password)) => {
            let mailer = SmtpMailer::new(&settings.email, user, password)?;
            info!("✅ SMTP mailer configured for {}", settings.email.host);
            Some(Arc::new(mailer))
        }
        None => None,
    };

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let state = AppState::new(settings, stores, mailer)?;
    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = db_pool {
        pool.close().await;
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
