//! Proxy server command.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::Request;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use wicket_proxy::config::validate_config;
use wicket_proxy::extract::RequestMeta;
use wicket_proxy::{create_router, AppState, ProxyConfig};

/// Runs the proxy server until a shutdown signal arrives.
///
/// # Errors
/// Returns an error if the server fails to bind or start.
pub async fn run(config: ProxyConfig) -> Result<()> {
    validate_config(&config);

    let bind_addr = config.bind_addr;
    let purge_interval = config.purge_interval();
    let read_timeout = config.read_timeout();
    let write_timeout = config.write_timeout();
    let grace_timeout = config.grace_timeout();

    let state = Arc::new(AppState::new(config)?);

    // Sweeper: reclaims expired flow records. Correctness never depends
    // on it, since expired entries are already invisible to reads; it
    // only bounds memory.
    let sweeper_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reclaimed = sweeper_state.store.purge_expired();
            if reclaimed > 0 {
                tracing::debug!(reclaimed, "purged expired flow records");
            }
        }
    });

    // Access log: one span per request carrying the typed request
    // metadata; the response event records status and latency.
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let meta = RequestMeta::from_headers(request.headers());
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %meta.request_id,
                remote_ip = ?meta.remote_ip,
                user_agent = meta.user_agent.as_deref().unwrap_or(""),
                referer = meta.referer.as_deref().unwrap_or(""),
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let app = create_router(state)
        .layer(trace)
        // Bounds the handler and the response write; reading the
        // request body is bounded separately. Connection-level
        // header-read and idle limits stay with the HTTP stack.
        .layer(TimeoutLayer::new(write_timeout))
        .layer(RequestBodyTimeoutLayer::new(read_timeout));

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("wicket proxy listening on {bind_addr}");

    // Serve in a task so the drain after a signal can be bounded by the
    // grace timeout.
    let (signaled_tx, signaled_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signaled_tx.send(());
            })
            .await
    });

    tokio::select! {
        // Server died on its own (bind was fine, so this is fatal).
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = signaled_rx => {}
    }

    // In-flight handlers get the grace window, then the process exits
    // regardless. In-flight flows are lost; nothing is persisted.
    match tokio::time::timeout(grace_timeout, server).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!(
                grace_secs = grace_timeout.as_secs(),
                "grace period elapsed with requests still in flight"
            );
        }
    }

    tracing::info!("shutting down");
    Ok(())
}

/// Resolves when the process receives ctrl-c or SIGTERM.
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
            tracing::warn!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::warn!("received terminate signal, shutting down");
        },
    }
}
