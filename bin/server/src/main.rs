use rootcause::Report;
use std::sync::Arc;
use switchboard_cache::{Reaper, SessionCache};
use switchboard_dispatch::Dispatcher;
use switchboard_server::{
    app::router, assistant::EchoAssistant, config::ServerConfig, error::ServerError,
    listeners::logging_listeners, state::AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<ServerError>> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| ServerError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");
    if config.secret.is_none() {
        tracing::warn!("no webhook secret configured, accepting unauthenticated webhooks");
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: config.bind_addr.clone(),
            details: e.to_string(),
        })?;

    let dispatcher = Dispatcher::new(logging_listeners(), config.dispatch.clone());
    let cache = Arc::new(SessionCache::new());
    let state = Arc::new(AppState::new(
        &config,
        Arc::clone(&cache),
        dispatcher.publisher(),
        Arc::new(EchoAssistant::default()),
    ));

    let running = dispatcher.start();
    let reaper = Reaper::spawn(cache, &config.cache);

    tracing::info!("listening on http://{}", config.bind_addr);

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // In-flight requests are done; queued events are drained last.
    if let Some(reaper) = reaper {
        reaper.stop().await;
    }
    let stats = running.stop().await;
    tracing::info!(
        events = stats.events_dispatched,
        handler_failures = stats.handler_failures,
        "Shut down"
    );

    served.map_err(|e| ServerError::Serve {
        details: e.to_string(),
    })?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
