// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy page-id discovery for Instagram/Facebook channels.
//!
//! Channels are often created with only an access token; the page id behind
//! that token is resolved at send time and persisted back to the channel so
//! subsequent sends skip the round-trips.

use serde_json::Value;
use tracing::{debug, warn};

use omniroute_core::OmnirouteError;

/// Resolve the page id behind `access_token`, trying in order:
///
/// 1. `GET /me/accounts` -- first page the token can manage;
/// 2. `GET /me?fields=business` then `GET /{business_id}/owned_pages` --
///    first page owned by the token's business;
/// 3. `None` -- the caller falls back to sending via `/me/messages`, which
///    works for some Graph token types but not all.
///
/// Individual step failures advance the chain rather than aborting: a token
/// without page discovery permissions is a configuration shape, not an error.
pub async fn discover_page_id(
    http: &reqwest::Client,
    base_url: &str,
    access_token: &str,
) -> Result<Option<String>, OmnirouteError> {
    let base_url = base_url.trim_end_matches('/');

    if let Some(page_id) =
        first_data_id(http, &format!("{base_url}/me/accounts"), access_token).await
    {
        debug!(page_id, "page id discovered via /me/accounts");
        return Ok(Some(page_id));
    }

    if let Some(business_id) = fetch_business_id(http, base_url, access_token).await {
        if let Some(page_id) = first_data_id(
            http,
            &format!("{base_url}/{business_id}/owned_pages"),
            access_token,
        )
        .await
        {
            debug!(page_id, business_id, "page id discovered via owned_pages");
            return Ok(Some(page_id));
        }
    }

    warn!("page id discovery exhausted, sends will go through /me/messages");
    Ok(None)
}

async fn fetch_json(http: &reqwest::Client, url: &str, access_token: &str) -> Option<Value> {
    let response = match http.get(url).bearer_auth(access_token).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(url, error = %e, "discovery request failed");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!(url, status = %response.status(), "discovery request rejected");
        return None;
    }
    response.json().await.ok()
}

async fn first_data_id(http: &reqwest::Client, url: &str, access_token: &str) -> Option<String> {
    fetch_json(http, url, access_token)
        .await?
        .pointer("/data/0/id")
        .and_then(Value::as_str)
        .map(String::from)
}

async fn fetch_business_id(
    http: &reqwest::Client,
    base_url: &str,
    access_token: &str,
) -> Option<String> {
    fetch_json(http, &format!("{base_url}/me?fields=business"), access_token)
        .await?
        .pointer("/business/id")
        .and_then(Value::as_str)
        .map(String::from)
}
