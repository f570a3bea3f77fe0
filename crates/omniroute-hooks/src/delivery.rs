// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single webhook delivery: header construction, signing, POST, outcome.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tracing::{debug, warn};

use omniroute_core::types::UserWebhook;
use omniroute_storage::queries::webhooks::DeliveryRecord;

use crate::signing;

/// Response bodies are truncated before logging; subscribers returning HTML
/// error pages should not bloat the delivery log.
const MAX_LOGGED_BODY: usize = 1024;

/// Deliver one event payload to one webhook and describe the outcome.
///
/// Never returns an error: every outcome (2xx, non-2xx, network failure,
/// timeout) becomes a [`DeliveryRecord`] for the log. Failures are not
/// retried.
pub async fn deliver(
    http: &reqwest::Client,
    webhook: &UserWebhook,
    event_name: &str,
    timestamp: &str,
    body: &str,
    timeout: Duration,
) -> DeliveryRecord {
    let mut record = DeliveryRecord {
        event: event_name.to_string(),
        payload: body.to_string(),
        response_status: None,
        response_body: None,
        error: None,
    };

    let headers = match build_headers(webhook, event_name, timestamp, body) {
        Ok(headers) => headers,
        Err(message) => {
            warn!(webhook_id = %webhook.id, error = %message, "invalid webhook headers");
            record.error = Some(message);
            return record;
        }
    };

    let request = http
        .post(&webhook.url)
        .headers(headers)
        .body(body.to_string());

    match tokio::time::timeout(timeout, request.send()).await {
        Err(_) => {
            record.error = Some(format!("timeout after {}s", timeout.as_secs()));
        }
        Ok(Err(e)) => {
            record.error = Some(format!("request failed: {e}"));
        }
        Ok(Ok(response)) => {
            let status = response.status();
            record.response_status = Some(status.as_u16() as i64);
            let mut text = response.text().await.unwrap_or_default();
            text.truncate(MAX_LOGGED_BODY);
            record.response_body = Some(text);
            if !status.is_success() {
                record.error = Some(format!("HTTP {status}"));
            }
        }
    }

    match &record.error {
        None => debug!(webhook_id = %webhook.id, event = event_name, "webhook delivered"),
        Some(error) => {
            warn!(webhook_id = %webhook.id, event = event_name, error = %error, "webhook delivery failed")
        }
    }
    record
}

/// Build the delivery headers: content type, event metadata, the user's
/// static headers, and -- when a secret is set -- the HMAC signature plus the
/// legacy raw-secret echo.
fn build_headers(
    webhook: &UserWebhook,
    event_name: &str,
    timestamp: &str,
    body: &str,
) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "X-Webhook-Event",
        HeaderValue::from_str(event_name).map_err(|e| format!("invalid event header: {e}"))?,
    );
    headers.insert(
        "X-Webhook-Timestamp",
        HeaderValue::from_str(timestamp).map_err(|e| format!("invalid timestamp header: {e}"))?,
    );

    for (name, value) in &webhook.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid header name `{name}`: {e}"))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| format!("invalid header value: {e}"))?;
        headers.insert(name, value);
    }

    if let Some(secret) = webhook.secret.as_deref().filter(|s| !s.is_empty()) {
        headers.insert(
            "X-Webhook-Signature",
            HeaderValue::from_str(&signing::signature_header(secret, body))
                .map_err(|e| format!("invalid signature header: {e}"))?,
        );
        // Kept for subscribers that predate signature verification.
        let mut secret_value =
            HeaderValue::from_str(secret).map_err(|e| format!("invalid secret header: {e}"))?;
        secret_value.set_sensitive(true);
        headers.insert("X-Webhook-Secret", secret_value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_webhook(secret: Option<&str>, extra: &[(&str, &str)]) -> UserWebhook {
        UserWebhook {
            id: "wh-1".to_string(),
            user_id: "u-1".to_string(),
            url: "https://hooks.example.com/in".to_string(),
            events: vec![],
            headers: extra
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            secret: secret.map(String::from),
            channel_ids: vec![],
            is_active: true,
            trigger_count: 0,
            last_triggered_at: None,
            last_error: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn headers_carry_event_and_timestamp() {
        let webhook = make_webhook(None, &[]);
        let headers =
            build_headers(&webhook, "message.sent", "2026-02-01T10:00:00.000Z", "{}").unwrap();
        assert_eq!(headers.get("X-Webhook-Event").unwrap(), "message.sent");
        assert_eq!(
            headers.get("X-Webhook-Timestamp").unwrap(),
            "2026-02-01T10:00:00.000Z"
        );
        assert!(headers.get("X-Webhook-Signature").is_none());
        assert!(headers.get("X-Webhook-Secret").is_none());
    }

    #[test]
    fn secret_adds_signature_and_legacy_echo() {
        let webhook = make_webhook(Some("s3cret"), &[]);
        let body = r#"{"event":"message.sent"}"#;
        let headers = build_headers(&webhook, "message.sent", "t", body).unwrap();
        assert_eq!(
            headers.get("X-Webhook-Signature").unwrap().to_str().unwrap(),
            signing::signature_header("s3cret", body)
        );
        assert_eq!(headers.get("X-Webhook-Secret").unwrap(), "s3cret");
    }

    #[test]
    fn user_headers_are_included() {
        let webhook = make_webhook(None, &[("X-Team", "support")]);
        let headers = build_headers(&webhook, "message.sent", "t", "{}").unwrap();
        assert_eq!(headers.get("X-Team").unwrap(), "support");
    }

    #[test]
    fn invalid_user_header_is_rejected() {
        let webhook = make_webhook(None, &[("bad header", "x")]);
        assert!(build_headers(&webhook, "message.sent", "t", "{}").is_err());
    }
}
