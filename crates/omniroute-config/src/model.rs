// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Omniroute messaging gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Omniroute configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OmnirouteConfig {
    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// WhatsApp Evolution API settings.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Meta Graph API settings (WhatsApp Cloud, Instagram, Facebook).
    #[serde(default)]
    pub graph: GraphConfig,

    /// Telegram Bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Outbound HTTP client settings for provider adapters.
    #[serde(default)]
    pub http: HttpConfig,

    /// User webhook dispatch settings.
    #[serde(default)]
    pub webhooks: WebhookConfig,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for API auth. `None` disables auth.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8975
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("omniroute").join("omniroute.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "omniroute.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// WhatsApp Evolution API configuration.
///
/// The Evolution API is operator-controlled, so both values must be
/// provisioned; `None` disables Evolution-backed channels.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Base URL of the Evolution API deployment.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Value for the `apikey` header.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Meta Graph API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Graph API base URL including version segment.
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API base URL (without the `/bot{token}` segment).
    #[serde(default = "default_telegram_base_url")]
    pub base_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            base_url: default_telegram_base_url(),
        }
    }
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Outbound HTTP client configuration shared by all provider adapters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout for provider API calls, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    15
}

/// User webhook dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Per-delivery timeout, in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,

    /// Delivery log rows retained per webhook (oldest pruned on insert).
    #[serde(default = "default_log_retention")]
    pub log_retention: u32,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
            log_retention: default_log_retention(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

fn default_log_retention() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = OmnirouteConfig::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.webhooks.timeout_secs, 30);
        assert_eq!(config.webhooks.log_retention, 100);
        assert_eq!(config.graph.base_url, "https://graph.facebook.com/v21.0");
        assert_eq!(config.telegram.base_url, "https://api.telegram.org");
        assert!(config.evolution.base_url.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = "[gateway]\nhsot = \"0.0.0.0\"\n";
        let result: Result<OmnirouteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
