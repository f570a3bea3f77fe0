// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `omniroute serve`: wire the store, dispatch engine, webhook queue, and
//! gateway together and run until terminated.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use omniroute_config::OmnirouteConfig;
use omniroute_core::OmnirouteError;
use omniroute_dispatch::MessageDispatcher;
use omniroute_gateway::{AuthConfig, GatewayState};
use omniroute_hooks::WebhookDispatcher;
use omniroute_storage::Database;

/// Run the gateway server with the given configuration.
pub async fn run(config: OmnirouteConfig) -> Result<(), OmnirouteError> {
    init_tracing(&config.gateway.log_level);

    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    info!(path = %config.storage.database_path, "storage ready");

    let hooks = WebhookDispatcher::new(Arc::clone(&db), &config.webhooks)?;
    let dispatcher = Arc::new(MessageDispatcher::new(
        Arc::clone(&db),
        &config,
        Arc::clone(&hooks),
    ));

    if config.gateway.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is unset -- all API requests will be rejected");
    }

    let state = GatewayState {
        dispatcher,
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        start_time: std::time::Instant::now(),
    };

    omniroute_gateway::start_server(&config.gateway, state).await
}

/// Install the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
