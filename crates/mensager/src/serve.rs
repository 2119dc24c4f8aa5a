// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mensager serve`: wires storage, the realtime hub, ingestion and the
//! HTTP gateway, then runs until a shutdown signal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mensager_bus::{Dispatcher, Hub, SessionConfig};
use mensager_config::MensagerConfig;
use mensager_core::{MensagerError, PluginAdapter};
use mensager_evolution::HttpMediaRehoster;
use mensager_gateway::{AuthState, GatewayState, build_router, start_server};
use mensager_ingest::IngestionPipeline;
use mensager_storage::SqliteStorage;
use tracing::{info, warn};

use crate::shutdown;

pub async fn run_serve(config: MensagerConfig) -> Result<(), MensagerError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting mensager");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let store = Arc::new(storage);

    let media_dir = Path::new(&config.media.storage_path);
    tokio::fs::create_dir_all(media_dir)
        .await
        .map_err(|e| MensagerError::Media {
            message: format!("failed to create media directory {}: {e}", media_dir.display()),
            source: Some(Box::new(e)),
        })?;
    let media = Arc::new(HttpMediaRehoster::new(&config.media)?);

    let hub = Arc::new(Hub::new());
    let pipeline =
        IngestionPipeline::new(store.clone(), Dispatcher::new(hub.clone())).with_media(media);

    let session = SessionConfig {
        outbox_capacity: config.realtime.outbox_capacity,
        heartbeat_interval: Duration::from_secs(config.realtime.heartbeat_interval_secs),
    };

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| MensagerError::Config("auth.jwt_secret is required to serve".to_string()))?;

    let shutdown = shutdown::install_signal_handler();
    let state = GatewayState::new(store.clone(), hub, pipeline, session, shutdown.clone());
    let router = build_router(state, AuthState::from_secret(secret), media_dir);

    let served = start_server(&config.server, router, shutdown).await;

    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }
    info!("mensager stopped");
    served
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mensager={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
