// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles POST /v1/messages (outbound send), POST /v1/inbound (provider
//! message recording), and GET /health.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use omniroute_core::types::OutboundContent;
use omniroute_core::OmnirouteError;
use omniroute_dispatch::InboundContent;

use crate::server::GatewayState;

/// Request body for POST /v1/messages.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// CRM user scope the recipient is resolved in.
    pub user_id: String,
    /// Conversation id, provider chat id, or phone number.
    pub to: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

/// Request body for POST /v1/inbound.
#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    pub user_id: String,
    pub channel_id: String,
    pub remote_identifier: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map dispatch errors onto the HTTP taxonomy: validation is the caller's
/// fault, configuration and storage are ours, provider failures are a bad
/// gateway.
fn error_response(err: OmnirouteError) -> Response {
    let status = match &err {
        OmnirouteError::Validation(_) => StatusCode::BAD_REQUEST,
        OmnirouteError::NotFound { .. } => StatusCode::NOT_FOUND,
        OmnirouteError::ExternalApi { .. } => StatusCode::BAD_GATEWAY,
        OmnirouteError::ChannelConfig { .. }
        | OmnirouteError::Config(_)
        | OmnirouteError::Storage { .. }
        | OmnirouteError::Webhook { .. }
        | OmnirouteError::Timeout { .. }
        | OmnirouteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// POST /v1/messages
///
/// Sends text and/or media to whatever `to` resolves to and returns the
/// persisted message record.
pub async fn post_messages(
    State(state): State<GatewayState>,
    Json(body): Json<SendRequest>,
) -> Response {
    let content = OutboundContent {
        text: body.text,
        media_url: body.media_url,
        media_type: body.media_type,
    };
    match state.dispatcher.send(&body.user_id, &body.to, content).await {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/inbound
///
/// Records a provider-delivered message against its conversation,
/// creating the conversation on first contact.
pub async fn post_inbound(
    State(state): State<GatewayState>,
    Json(body): Json<InboundRequest>,
) -> Response {
    let inbound = InboundContent {
        text: body.text,
        media_url: body.media_url,
        media_type: body.media_type,
        external_id: body.external_id,
        contact_name: body.contact_name,
    };
    match state
        .dispatcher
        .record_inbound(
            &body.user_id,
            &body.channel_id,
            &body.remote_identifier,
            inbound,
        )
        .await
    {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /health (unauthenticated).
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
        }),
    )
        .into_response()
}
