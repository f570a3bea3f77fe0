// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use omniroute_config::model::GatewayConfig;
use omniroute_core::OmnirouteError;
use omniroute_dispatch::MessageDispatcher;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<MessageDispatcher>,
    pub auth: AuthConfig,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Build the gateway router:
/// - GET /health (public)
/// - POST /v1/messages (bearer auth)
/// - POST /v1/inbound (bearer auth)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_messages))
        .route("/v1/inbound", post(handlers::post_inbound))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve the gateway until the process exits.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
) -> Result<(), OmnirouteError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| OmnirouteError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| OmnirouteError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
