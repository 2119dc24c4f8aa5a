// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use mensager_bus::{Dispatcher, Hub, SessionConfig};
use mensager_config::model::ServerConfig;
use mensager_core::{InboxStore, MensagerError};
use mensager_ingest::IngestionPipeline;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthState, auth_middleware};
use crate::{handlers, sse};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<dyn InboxStore>,
    pub hub: Arc<Hub>,
    pub dispatcher: Dispatcher,
    pub pipeline: IngestionPipeline,
    pub session: SessionConfig,
    /// Parent of every streaming session's cancellation token.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl GatewayState {
    /// The dispatcher publishes into `hub`; the pipeline should share it.
    pub fn new(
        store: Arc<dyn InboxStore>,
        hub: Arc<Hub>,
        pipeline: IngestionPipeline,
        session: SessionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(hub.clone()),
            store,
            hub,
            pipeline,
            session,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: GatewayState, auth: AuthState, media_dir: &Path) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/evolution", post(handlers::evolution_webhook))
        .nest_service("/media", ServeDir::new(media_dir))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/v1/realtime", get(sse::realtime))
        .route("/api/v1/inboxes", post(handlers::create_inbox))
        .route(
            "/api/v1/inboxes/{id}/conversations",
            delete(handlers::clear_inbox),
        )
        .route(
            "/api/v1/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route(
            "/api/v1/conversations/{id}",
            axum::routing::patch(handlers::update_conversation)
                .delete(handlers::delete_conversation),
        )
        .route(
            "/api/v1/conversations/{id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route(
            "/api/v1/conversations/{id}/read",
            post(handlers::mark_conversation_read),
        )
        .route("/api/v1/messages/read", post(handlers::mark_messages_read))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds `host:port` and serves until `shutdown` fires. Open SSE sessions
/// derive their tokens from the same parent and close with it.
pub async fn start_server(
    config: &ServerConfig,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), MensagerError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MensagerError::Gateway {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| MensagerError::Gateway {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}
