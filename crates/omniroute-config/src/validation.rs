// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, non-empty paths, and URL schemes.

use crate::diagnostic::ConfigError;
use crate::model::OmnirouteConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &OmnirouteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    for (key, url) in [
        ("evolution.base_url", config.evolution.base_url.as_deref()),
        ("graph.base_url", Some(config.graph.base_url.as_str())),
        ("telegram.base_url", Some(config.telegram.base_url.as_str())),
    ] {
        if let Some(url) = url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ConfigError::Validation {
                message: format!("{key} `{url}` must start with http:// or https://"),
            });
        }
    }

    // An Evolution deployment without its apikey cannot authenticate.
    if config.evolution.base_url.is_some() && config.evolution.api_key.is_none() {
        errors.push(ConfigError::Validation {
            message: "evolution.api_key is required when evolution.base_url is set".to_string(),
        });
    }

    if config.http.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "http.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.webhooks.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "webhooks.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.webhooks.log_retention == 0 {
        errors.push(ConfigError::Validation {
            message: "webhooks.log_retention must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn default_config_is_valid() {
        let config = OmnirouteConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_evolution_url_without_api_key() {
        let config = load_config_from_str("[evolution]\nbase_url = \"https://wa.example\"\n")
            .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("evolution.api_key")));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = load_config_from_str(
            "[evolution]\nbase_url = \"ftp://wa.example\"\napi_key = \"k\"\n",
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("evolution.base_url")));
    }

    #[test]
    fn rejects_zero_timeouts_and_retention() {
        let config = load_config_from_str(
            "[http]\ntimeout_secs = 0\n[webhooks]\ntimeout_secs = 0\nlog_retention = 0\n",
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn collects_all_errors_not_just_first() {
        let mut config = OmnirouteConfig::default();
        config.gateway.host = String::new();
        config.storage.database_path = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
