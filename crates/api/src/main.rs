//! `cartwheel-api` binary: the HTTP server over `PostgreSQL`.
//!
//! Schema migrations are applied out of band with `cartwheel migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use cartwheel_api::config::{ApiConfig, LogFormat};
use cartwheel_api::db::{self, PgStore};
use cartwheel_api::state::AppState;
use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "cartwheel_api=info,tower_http=info";

fn init_sentry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_deref()?;
    let options = sentry::ClientOptions {
        release: sentry::release_name!(),
        environment: config.sentry.environment.clone().map(Into::into),
        sample_rate: config.sentry.sample_rate,
        traces_sample_rate: config.sentry.traces_sample_rate,
        attach_stacktrace: true,
        ..Default::default()
    };
    Some(sentry::init((dsn, options)))
}

/// Warnings and errors become Sentry events, info and debug become breadcrumbs.
fn sentry_filter(metadata: &tracing::Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let sentry_layer = sentry_tracing::layer().event_filter(sentry_filter);
    let registry = tracing_subscriber::registry().with(filter).with(sentry_layer);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

async fn serve(config: ApiConfig) -> Result<(), Box<dyn Error>> {
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    let store = Arc::new(PgStore::new(pool));
    tracing::info!(max_connections = config.db_max_connections, "database pool ready");

    let addr = config.socket_addr();
    let state = AppState::new(config, store)?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "cartwheel api listening");

    axum::serve(listener, cartwheel_api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // The Sentry client must exist before the tracing layer forwards to it.
    let _sentry = init_sentry(&config);
    init_tracing(config.log_format);

    match serve(config).await {
        Ok(()) => {
            tracing::info!("server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown requested, draining connections");
}
