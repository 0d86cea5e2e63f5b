/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config 読み込み → 依存生成 (pool, verifier, storage) → Router 組み立て
 * - Middleware の適用 (security headers / CORS / request id / timeout / trace)
 * - axum::serve() で起動、SIGINT/SIGTERM で graceful shutdown
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::health_repo::PgHealthProbe;
use crate::repos::production_repo::ProductionRepo;
use crate::repos::user_repo::UserRepo;
use crate::services::auth::{TenantScoper, build_login_service, build_verifier};
use crate::services::storage::GcsStorage;
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG=info,documents_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched.
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting documents API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Build process-level services and inject them into the shared state.
///
/// The pool connects lazily so the process can start (and `/health` can
/// report it) while the database is still down. Storage credentials are
/// discovered up front, so a missing ADC source fails startup.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.request_timeout_seconds))
        .connect_lazy(&config.database_url)
        .context("parsing DATABASE_URL")?;

    let verifier = build_verifier(config)?;
    let login = build_login_service(config, &verifier, Arc::new(UserRepo::new(pool.clone())))?;
    let storage = GcsStorage::from_config(
        &config.storage,
        Duration::from_secs(config.request_timeout_seconds),
    )
    .await
    .context("discovering storage credentials")?;

    Ok(AppState::new(
        Arc::new(verifier),
        Arc::new(TenantScoper::new(config.claims.clone())),
        login.map(Arc::new),
        Arc::new(ProductionRepo::new(pool.clone())),
        Arc::new(storage),
        Arc::new(PgHealthProbe::new(pool)),
    ))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes(state.clone()).with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
