//! amssvc service binary: REST API, credential manager and dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use amssvc_api::{create_router, metrics, ApiConfig, AppState};
use amssvc_media::{
    credential_channel, AadTokenSource, AmsClient, CredentialConfig, CredentialManager,
    IdentityConfig, MediaServicesConfig,
};
use amssvc_store::JobStore;
use amssvc_worker::{Dispatcher, DispatcherConfig};

/// Time allowed for the background loops to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    init_tracing();

    info!("Starting amssvc");

    let identity = match IdentityConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load identity config: {}", e);
            std::process::exit(1);
        }
    };
    let services = match MediaServicesConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load media services config: {}", e);
            std::process::exit(1);
        }
    };
    let dispatcher_config = DispatcherConfig::from_env();
    let credential_config = CredentialConfig::from_env();
    let api_config = ApiConfig::from_env();

    info!(?identity, ?services, ?dispatcher_config, "Loaded configuration");

    let token_source = match AadTokenSource::new(identity) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create token client: {}", e);
            std::process::exit(1);
        }
    };
    let ams = match AmsClient::new(services) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create media services client: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(JobStore::new());
    let (publisher, credentials) = credential_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let manager = CredentialManager::new(Arc::new(token_source), publisher, credential_config);
    let credential_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { manager.run(shutdown).await })
    };

    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::new(ams),
        credentials.clone(),
        dispatcher_config,
    );
    let dispatcher_task = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let metrics_handle = if api_config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let state = AppState::new(api_config.clone(), store, credentials);
    let app = create_router(state, metrics_handle);

    let addr = api_config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await;
    if let Err(e) = serve {
        error!("Server error: {}", e);
    }

    // Also reached when the server stopped on its own.
    shutdown_tx.send_replace(true);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = credential_task.await;
        let _ = dispatcher_task.await;
    })
    .await;
    if drained.is_err() {
        warn!("Background tasks did not stop within {:?}", SHUTDOWN_GRACE);
    }

    info!("Server shutdown complete");
}

/// JSON output when `LOG_FORMAT=json`, colored output otherwise.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amssvc=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
    shutdown.send_replace(true);
}
