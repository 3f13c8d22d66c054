// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use teamboard_grants::{
    api::router,
    config::{Config, LogFormat, DEFAULT_LOG_FILTER},
    grants::{events, GrantEngine, GrantEvent},
    signer::S3Signer,
    state::AppState,
    storage::{GrantDatabase, RedbGrantStore, RedbGroupDirectory},
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");
    let database = Arc::new(
        GrantDatabase::open(&config.database_path()).expect("Failed to open grant database"),
    );
    let store = Arc::new(RedbGrantStore::new(database.clone(), config.cache_capacity));
    let directory = Arc::new(RedbGroupDirectory::new(database));
    let signer = Arc::new(
        S3Signer::connect(config.object_store.clone())
            .await
            .expect("Invalid object store configuration"),
    );

    let (events, _) = events::channel(events::DEFAULT_EVENT_CAPACITY);
    let engine = Arc::new(
        GrantEngine::new(store, signer, directory, events).with_policy(config.policy),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    tokio::spawn(log_events(engine.subscribe(), shutdown.clone()));

    let app = router(AppState::new(engine).with_data_dir(&config.data_dir));
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    info!(
        addr = %addr,
        bucket = %config.object_store.bucket,
        database = %config.database_path().display(),
        "Grant service listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .expect("HTTP server failed");

    info!("Grant service stopped");
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

async fn log_events(mut events: broadcast::Receiver<GrantEvent>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = events.recv() => match event {
                Ok(event) => debug!(
                    kind = ?event.kind,
                    owning_group = %event.owning_group,
                    key = %event.key,
                    "Grant event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Grant event log lagging");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}
