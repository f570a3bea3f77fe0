// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./omniroute.toml` > `~/.config/omniroute/omniroute.toml`
//! > `/etc/omniroute/omniroute.toml` with environment variable overrides via
//! `OMNIROUTE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::OmnirouteConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/omniroute/omniroute.toml` (system-wide)
/// 3. `~/.config/omniroute/omniroute.toml` (user XDG config)
/// 4. `./omniroute.toml` (local directory)
/// 5. `OMNIROUTE_*` environment variables
pub fn load_config() -> Result<OmnirouteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OmnirouteConfig::default()))
        .merge(Toml::file("/etc/omniroute/omniroute.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("omniroute/omniroute.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("omniroute.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<OmnirouteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OmnirouteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<OmnirouteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OmnirouteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `OMNIROUTE_GATEWAY_BEARER_TOKEN`
/// must map to `gateway.bearer_token`, not `gateway.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("OMNIROUTE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: OMNIROUTE_EVOLUTION_API_KEY -> "evolution_api_key"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("evolution_", "evolution.", 1)
            .replacen("graph_", "graph.", 1)
            .replacen("telegram_", "telegram.", 1)
            .replacen("http_", "http.", 1)
            .replacen("webhooks_", "webhooks.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_from_empty_string() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.gateway.port, 8975);
        assert_eq!(config.http.timeout_secs, 15);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            "[evolution]\nbase_url = \"https://wa.example.com\"\napi_key = \"k1\"\n\
             [webhooks]\ntimeout_secs = 10\n",
        )
        .unwrap();
        assert_eq!(
            config.evolution.base_url.as_deref(),
            Some("https://wa.example.com")
        );
        assert_eq!(config.webhooks.timeout_secs, 10);
        // Untouched sections keep defaults.
        assert_eq!(config.webhooks.log_retention, 100);
    }
}
