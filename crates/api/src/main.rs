use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botrelay_api::background::cooldown_sweep;
use botrelay_api::config::ServerConfig;
use botrelay_api::router::build_app_router;
use botrelay_api::state::AppState;
use botrelay_api::ws;
use botrelay_events::{JobLogForwarder, WebhookDelivery};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botrelay_api=debug,botrelay_events=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        host = %config.host,
        port = config.port,
        bots = config.bots.len(),
        single_job_mode = config.single_job_mode,
        cooldown_secs = config.cooldown.map(|c| c.as_secs()).unwrap_or(0),
        job_timeout_secs = config.job_timeout.as_secs(),
        "Loaded server configuration"
    );

    let addr: SocketAddr = match config.host.parse() {
        Ok(ip) => SocketAddr::new(ip, config.port),
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // --- App state (relay, push channel, event bus) ---
    let state = AppState::from_config(config.clone());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.ws_manager));

    // --- Job log forwarder ---
    let forwarder_cancel = CancellationToken::new();
    let forwarder_handle = match (&config.log_webhook_url, WebhookDelivery::new()) {
        (Some(url), Ok(delivery)) => {
            let forwarder = JobLogForwarder::new(url.clone(), delivery);
            Some(tokio::spawn(
                forwarder.run(state.event_bus.subscribe(), forwarder_cancel.clone()),
            ))
        }
        (Some(_), Err(e)) => {
            tracing::error!(error = %e, "Failed to build job log client, job logging disabled");
            None
        }
        (None, _) => {
            tracing::warn!("LOG_WEBHOOK_URL not set, job logging disabled");
            None
        }
    };

    // --- Cooldown sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(cooldown_sweep::run(
        Arc::clone(&state.relay),
        cooldown_sweep::SWEEP_INTERVAL,
        sweep_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state.clone(), &config);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(shutdown_timeout, sweep_handle).await;

    state.relay.shutdown().await;

    let ws_count = state.ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    state.ws_manager.shutdown_all().await;
    heartbeat_handle.abort();

    // Handler tasks still winding down may hold the bus, so stop the
    // forwarder explicitly. It logs what is already queued, then waits for
    // in-flight deliveries.
    forwarder_cancel.cancel();
    if let Some(handle) = forwarder_handle {
        if tokio::time::timeout(shutdown_timeout, handle).await.is_err() {
            tracing::warn!("Job log forwarder did not drain in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
