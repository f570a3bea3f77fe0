// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API channel adapter (Meta Graph v21.0).
//!
//! Text goes to `POST /{phone_number_id}/messages`. Media prefers the
//! upload-then-reference flow via `POST /{phone_number_id}/media` -- a
//! `media_id` send is more reliable than a bare link -- and falls back to
//! `{link: url}` when no local buffer exists or the upload fails.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, warn};

use omniroute_core::{ChannelAdapter, ChannelType, MediaPayload, OmnirouteError, SendResult};

const PROVIDER: &str = "whatsapp_cloud";

/// Client for one WhatsApp Business phone number.
#[derive(Debug, Clone)]
pub struct CloudApiClient {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: String,
}

impl CloudApiClient {
    /// Creates a client for the given phone number id, bearer-authenticated
    /// with `access_token`. `base_url` is the Graph API root including the
    /// version segment.
    pub fn new(
        base_url: &str,
        phone_number_id: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, OmnirouteError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|e| {
            OmnirouteError::Config(format!("invalid access token header value: {e}"))
        })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
        })
    }

    async fn post_message(&self, payload: &Value) -> Result<SendResult, OmnirouteError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("HTTP request failed: {e}")))?;
        let raw = read_json_response(response).await?;
        send_result(raw)
    }

    /// Upload media bytes, returning the Cloud API `media_id`.
    async fn upload_media(
        &self,
        buffer: Vec<u8>,
        mime_type: &str,
        file_name: &str,
    ) -> Result<String, OmnirouteError> {
        let url = format!("{}/{}/media", self.base_url, self.phone_number_id);

        let part = reqwest::multipart::Part::bytes(buffer)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("invalid media mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("media upload failed: {e}")))?;
        let body = read_json_response(response).await?;

        body.get("id")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| OmnirouteError::api(PROVIDER, "media upload response is missing id"))
    }
}

async fn read_json_response(response: reqwest::Response) -> Result<Value, OmnirouteError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        // Graph errors carry a structured `error.message`.
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .unwrap_or(body);
        return Err(OmnirouteError::ExternalApi {
            provider: PROVIDER.to_string(),
            status: Some(status.as_u16()),
            detail,
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| OmnirouteError::api(PROVIDER, format!("invalid JSON response: {e}")))
}

/// Extract the provider message id from a Cloud API send response:
/// `{"messages": [{"id": "wamid..."}]}`.
fn send_result(raw: Value) -> Result<SendResult, OmnirouteError> {
    let external_id = raw
        .pointer("/messages/0/id")
        .and_then(Value::as_str)
        .ok_or_else(|| OmnirouteError::api(PROVIDER, "response is missing messages[0].id"))?
        .to_string();
    Ok(SendResult { external_id, raw })
}

/// Map a mime type to the Cloud API message type discriminator.
fn media_kind(mime_type: &str) -> &'static str {
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

/// Normalize audio mime types to `audio/ogg`.
///
/// Browser recorders produce WebM/MP4 containers the Cloud API rejects;
/// its supported audio set is narrower than MediaRecorder's.
fn normalize_audio_mime(mime_type: &str) -> String {
    if mime_type.starts_with("audio/") && !mime_type.starts_with("audio/ogg") {
        "audio/ogg".to_string()
    } else {
        mime_type.to_string()
    }
}

#[async_trait]
impl ChannelAdapter for CloudApiClient {
    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsappCloud
    }

    async fn send_text(&self, target: &str, text: &str) -> Result<SendResult, OmnirouteError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": target,
            "type": "text",
            "text": { "body": text },
        });
        self.post_message(&payload).await
    }

    async fn send_media(
        &self,
        target: &str,
        media: &MediaPayload,
    ) -> Result<SendResult, OmnirouteError> {
        let mime_type = normalize_audio_mime(&media.mime_type);
        let kind = media_kind(&mime_type);

        let mut media_object = match &media.buffer {
            Some(buffer) => {
                let file_name = media.file_name.as_deref().unwrap_or("upload");
                match self
                    .upload_media(buffer.clone(), &mime_type, file_name)
                    .await
                {
                    Ok(media_id) => {
                        debug!(media_id, kind, "cloud media uploaded");
                        json!({ "id": media_id })
                    }
                    Err(e) => {
                        warn!(error = %e, "media upload failed, falling back to link send");
                        json!({ "link": media.url })
                    }
                }
            }
            None => json!({ "link": media.url }),
        };

        // The Cloud API rejects captions on audio messages.
        if kind != "audio"
            && let Some(caption) = &media.caption
        {
            media_object["caption"] = json!(caption);
        }

        let mut payload = json!({
            "messaging_product": "whatsapp",
            "to": target,
            "type": kind,
        });
        payload[kind] = media_object;
        self.post_message(&payload).await
    }
}
