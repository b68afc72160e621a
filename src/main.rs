//! LMS 服务主入口

use lms_service::{
    clock::{Clock, SystemClock},
    config::{AppConfig, StorageBackend},
    db,
    handlers::health,
    middleware::AppState,
    repository::{CredentialStore, FeedbackRepository, FeedbackStore, InMemoryStore, UserRepository},
    routes,
    services::{EmailSender, LogMailer},
    telemetry,
};
use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal, sync::oneshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("lms-service {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    if let Ok(env) = std::env::var("LMS_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::mark_start();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;
    let config = Arc::new(config);

    telemetry::init_telemetry(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "LMS service starting...");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (store, feedback_store): (Arc<dyn CredentialStore>, Arc<dyn FeedbackStore>) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                let pool = db::create_pool(&config.database).await?;
                db::run_migrations(&pool).await?;
                tracing::info!("Database initialized");
                let users: Arc<dyn CredentialStore> = Arc::new(UserRepository::new(pool.clone()));
                let feedback: Arc<dyn FeedbackStore> = Arc::new(FeedbackRepository::new(pool));
                (users, feedback)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                let memory = Arc::new(InMemoryStore::new(clock.clone()));
                let users: Arc<dyn CredentialStore> = memory.clone();
                let feedback: Arc<dyn FeedbackStore> = memory;
                (users, feedback)
            }
        };

    if config.security.expose_reset_token {
        tracing::warn!("security.expose_reset_token is enabled; reset tokens are returned in API responses");
    }

    let mailer: Arc<dyn EmailSender> = Arc::new(LogMailer::new(config.mail.from_address.clone()));
    let app_state = Arc::new(AppState::build(
        config.clone(),
        store,
        feedback_store,
        mailer,
        clock,
    )?);

    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.server.addr).await?;
    tracing::info!(addr = %config.server.addr, "Server listening");

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(signalled_tx))
    .into_future();

    let grace = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    tokio::select! {
        result = server => result?,
        _ = async {
            // 收到信号后最多等待 grace 时间让在途请求完成
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(signalled: oneshot::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    let _ = signalled.send(());
}

fn print_help() {
    println!(
        r#"lms-service {}

Learning management backend: authentication, role-gated access, profiles and feedback.

USAGE:
    lms-service [--version | --help]

CONFIGURATION (environment, prefix LMS_, nesting separator __):
    LMS_SECURITY__JWT_SECRET        Token signing secret (required, >= 32 chars)
    LMS_SECURITY__TOKEN_TTL_SECS    Token lifetime in seconds (default 86400)
    LMS_SECURITY__EXPOSE_RESET_TOKEN Return reset tokens in responses (default false)
    LMS_DATABASE__URL               PostgreSQL connection URL
    LMS_STORAGE__BACKEND            postgres | memory (default postgres)
    LMS_SERVER__ADDR                Listen address (default 0.0.0.0:3000)
    LMS_MAIL__FRONTEND_URL          Base URL used in reset links
    LMS_LOGGING__LEVEL              trace | debug | info | warn | error
    LMS_LOGGING__FORMAT             json | pretty
    LMS_ENV                         Selects .env.<LMS_ENV> to load"#,
        env!("CARGO_PKG_VERSION")
    );
}
