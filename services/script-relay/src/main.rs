//! Apps Script Relay
//!
//! Single-binary service that holds one Google OAuth identity and performs
//! Apps Script operations on behalf of unauthenticated local callers:
//! 1. Loads the client identity and any persisted token
//! 2. Walks the operator through consent (/authorize, /callback)
//! 3. Creates, updates and runs scripts with the held credential

mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use apps_script::{Gateway, ScriptApi};
use google_auth::{AuthorizationFlow, CredentialStore, StatusReporter, TokenManager};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::{AppState, build_router};

/// How long in-flight requests may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting apps-script-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    let config = match &config_path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Config::load(Some(path.as_path()))
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => {
            info!("no config file, using defaults and environment");
            Config::load(None).context("invalid configuration from environment")?
        }
    };

    info!(
        listen_addr = %config.server.listen_addr,
        token_path = %config.oauth.token_path.display(),
        inline_identity = config.inline_identity.is_some(),
        script_api_url = %config.endpoints.script_api_url,
        "configuration loaded"
    );

    let timeout = Duration::from_secs(config.server.timeout_secs);
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;

    let manager = Arc::new(TokenManager::new(
        CredentialStore::new(config.oauth.token_path.clone()),
        config.oauth_endpoints(),
        http_client.clone(),
    ));

    // A bad identity leaves the relay up and unauthenticated so /health can
    // report it.
    let identity_source = config.identity_source();
    if let Err(e) = manager
        .initialize(&identity_source, config.oauth.redirect_uri.as_deref())
        .await
    {
        error!(error = %e, "client identity unavailable, authorization disabled");
    }

    let state = AppState {
        flow: AuthorizationFlow::new(manager.clone()),
        gateway: Gateway::new(
            manager.clone(),
            ScriptApi::new(http_client, config.endpoints.script_api_url.clone(), timeout),
        ),
        status: StatusReporter::new(manager.clone(), &identity_source),
        prometheus,
    };
    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(
        addr = %listen_addr,
        authenticated = manager.is_authenticated().await,
        "accepting requests"
    );

    // The drain timer starts at signal receipt, not at server start.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
