// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel adapter backed by a self-hosted Evolution API instance.
//!
//! The Evolution API bridges an underlying WhatsApp Web session and is
//! addressed by an instance id. Media is sent by URL reference -- the
//! Evolution instance fetches it server-side, so no upload step exists.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, warn};

use omniroute_core::{ChannelAdapter, ChannelType, MediaPayload, OmnirouteError, SendResult};

const PROVIDER: &str = "evolution";

/// Client for one Evolution API instance.
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    instance_id: String,
}

impl EvolutionClient {
    /// Creates a client for the instance identified by `instance_id`.
    ///
    /// `base_url` is the operator-controlled Evolution deployment;
    /// `api_key` fills the `apikey` header on every request.
    pub fn new(
        base_url: &str,
        api_key: &str,
        instance_id: &str,
        timeout: Duration,
    ) -> Result<Self, OmnirouteError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).map_err(|e| {
                OmnirouteError::Config(format!("invalid evolution api key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            instance_id: instance_id.to_string(),
        })
    }

    /// Fetch the instance's connection state (`open`, `connecting`, `close`).
    pub async fn connection_state(&self) -> Result<String, OmnirouteError> {
        let url = format!(
            "{}/instance/connectionState/{}",
            self.base_url, self.instance_id
        );
        let body = self.get_json(&url).await?;
        Ok(body
            .pointer("/instance/state")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    /// Point the instance's webhook at `url` for the given event list.
    pub async fn set_webhook(&self, url: &str, events: &[&str]) -> Result<(), OmnirouteError> {
        let endpoint = format!("{}/webhook/set/{}", self.base_url, self.instance_id);
        let payload = json!({
            "webhook": {
                "enabled": true,
                "url": url,
                "events": events,
            }
        });
        self.post_json(&endpoint, &payload).await?;
        debug!(instance = %self.instance_id, url, "evolution webhook configured");
        Ok(())
    }

    async fn get_json(&self, url: &str) -> Result<Value, OmnirouteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("HTTP request failed: {e}")))?;
        read_json_response(response).await
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, OmnirouteError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("HTTP request failed: {e}")))?;
        read_json_response(response).await
    }
}

async fn read_json_response(response: reqwest::Response) -> Result<Value, OmnirouteError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        return Err(OmnirouteError::ExternalApi {
            provider: PROVIDER.to_string(),
            status: Some(status.as_u16()),
            detail: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| OmnirouteError::api(PROVIDER, format!("invalid JSON response: {e}")))
}

/// Extract the provider message id from an Evolution send response.
///
/// Evolution wraps the underlying WhatsApp message key: `{"key": {"id": ...}}`.
fn send_result(raw: Value) -> Result<SendResult, OmnirouteError> {
    let external_id = raw
        .pointer("/key/id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            OmnirouteError::api(PROVIDER, "response is missing key.id")
        })?
        .to_string();
    Ok(SendResult { external_id, raw })
}

/// Resolve the `number` field for a send.
///
/// Group (`@g.us`) and hidden (`@lid`) JIDs pass through verbatim; a user JID
/// or bare phone number is reduced to its digits.
fn evolution_number(target: &str) -> String {
    if target.ends_with("@g.us") || target.ends_with("@lid") {
        return target.to_string();
    }
    match target.split_once('@') {
        Some((local, _)) => local.to_string(),
        None => target.to_string(),
    }
}

/// Map a media mime type to the Evolution `mediatype` field.
fn evolution_mediatype(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image/") {
        "image"
    } else if mime_type.starts_with("video/") {
        "video"
    } else if mime_type.starts_with("audio/") {
        "audio"
    } else {
        "document"
    }
}

#[async_trait]
impl ChannelAdapter for EvolutionClient {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Whatsapp
    }

    async fn send_text(&self, target: &str, text: &str) -> Result<SendResult, OmnirouteError> {
        let url = format!("{}/message/sendText/{}", self.base_url, self.instance_id);
        let payload = json!({
            "number": evolution_number(target),
            "text": text,
        });
        let raw = self.post_json(&url, &payload).await?;
        send_result(raw)
    }

    async fn send_media(
        &self,
        target: &str,
        media: &MediaPayload,
    ) -> Result<SendResult, OmnirouteError> {
        let number = evolution_number(target);

        // Voice notes go through the dedicated audio endpoint; everything
        // else uses sendMedia with a mediatype discriminator.
        let raw = if media.mime_type.starts_with("audio/") {
            let url = format!(
                "{}/message/sendWhatsAppAudio/{}",
                self.base_url, self.instance_id
            );
            let payload = json!({
                "number": number,
                "audio": media.url,
            });
            self.post_json(&url, &payload).await?
        } else {
            let url = format!("{}/message/sendMedia/{}", self.base_url, self.instance_id);
            let mut payload = json!({
                "number": number,
                "mediatype": evolution_mediatype(&media.mime_type),
                "mimetype": media.mime_type,
                "media": media.url,
            });
            if let Some(caption) = &media.caption {
                payload["caption"] = json!(caption);
            }
            if let Some(file_name) = &media.file_name {
                payload["fileName"] = json!(file_name);
            }
            self.post_json(&url, &payload).await?
        };

        if media.buffer.is_some() {
            // Evolution fetches media by URL; a local buffer is never uploaded.
            warn!(instance = %self.instance_id, "ignoring local media buffer for Evolution send");
        }

        send_result(raw)
    }
}
