// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Omniroute messaging gateway.

use thiserror::Error;

/// The primary error type used across the dispatch path, channel adapters,
/// and the webhook queue.
#[derive(Debug, Error)]
pub enum OmnirouteError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Request-level validation errors (no text or media, unresolvable recipient).
    /// Surfaced to callers as 400; produces no side effects.
    #[error("validation error: {0}")]
    Validation(String),

    /// A channel is missing the credentials its type requires
    /// (absent `phone_number_id`, empty `bot_token`, ...). Surfaced as 500;
    /// no partial send occurs.
    #[error("channel configuration error: {message}")]
    ChannelConfig { message: String },

    /// A provider API returned a non-2xx response or the request failed in
    /// transit. The attempted message is never marked sent.
    #[error("{provider} API error: {detail}")]
    ExternalApi {
        provider: String,
        status: Option<u16>,
        detail: String,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An entity lookup that the caller required came up empty.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Webhook delivery errors (non-2xx, network error). Logged per delivery,
    /// never surfaced to the triggering request.
    #[error("webhook error: {message}")]
    Webhook {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OmnirouteError {
    /// Shorthand for a storage error wrapping an arbitrary source.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Shorthand for a provider API error without an HTTP status
    /// (connect failure, timeout, body read error).
    pub fn api<S: Into<String>>(provider: &str, detail: S) -> Self {
        Self::ExternalApi {
            provider: provider.to_string(),
            status: None,
            detail: detail.into(),
        }
    }
}
