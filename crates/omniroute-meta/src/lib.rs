// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instagram/Facebook channel adapter over the Meta Graph Send API.
//!
//! Both channel types post to `POST /{page_id|me}/messages` with
//! `recipient.id` set to the PSID/IGSID. The Send API does not support
//! inline captions on attachments the way WhatsApp does, so a caption is
//! delivered as a second, separate text message.

pub mod discovery;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use omniroute_core::{ChannelAdapter, ChannelType, MediaPayload, OmnirouteError, SendResult};

const PROVIDER: &str = "meta";

/// Client for one Instagram or Facebook page.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    page_id: Option<String>,
    channel_type: ChannelType,
}

impl GraphClient {
    /// Creates a Send API client.
    ///
    /// `page_id` may be `None` for tokens whose page was never discovered;
    /// sends then go through `/me/messages`.
    pub fn new(
        base_url: &str,
        access_token: &str,
        page_id: Option<String>,
        channel_type: ChannelType,
        timeout: Duration,
    ) -> Result<Self, OmnirouteError> {
        if !channel_type.is_meta() {
            return Err(OmnirouteError::Config(format!(
                "GraphClient serves instagram/facebook channels, got `{channel_type}`"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            page_id,
            channel_type,
        })
    }

    fn messages_url(&self) -> String {
        let sender = self.page_id.as_deref().unwrap_or("me");
        format!("{}/{}/messages", self.base_url, sender)
    }

    async fn post_message(&self, payload: &Value) -> Result<SendResult, OmnirouteError> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("HTTP request failed: {e}")))?;
        let raw = read_json_response(response).await?;
        send_result(raw)
    }
}

async fn read_json_response(response: reqwest::Response) -> Result<Value, OmnirouteError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to read response body: {e}")))?;

    if !status.is_success() {
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

/// Extract the provider message id from a Send API response:
/// `{"recipient_id": ..., "message_id": "m_..."}`.
fn send_result(raw: Value) -> Result<SendResult, OmnirouteError> {
    let external_id = raw
        .get("message_id")
        .and_then(Value::as_str)
        .ok_or_else(|| OmnirouteError::api(PROVIDER, "response is missing message_id"))?
        .to_string();
    Ok(SendResult { external_id, raw })
}

/// Map a mime type to the Send API attachment type.
fn attachment_type(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image/") {
        "image"
    } else if mime_type.starts_with("video/") {
        "video"
    } else if mime_type.starts_with("audio/") {
        "audio"
    } else {
        "file"
    }
}

#[async_trait]
impl ChannelAdapter for GraphClient {
    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    async fn send_text(&self, target: &str, text: &str) -> Result<SendResult, OmnirouteError> {
        let payload = json!({
            "recipient": { "id": target },
            "message": { "text": text },
        });
        self.post_message(&payload).await
    }

    async fn send_media(
        &self,
        target: &str,
        media: &MediaPayload,
    ) -> Result<SendResult, OmnirouteError> {
        let payload = json!({
            "recipient": { "id": target },
            "message": {
                "attachment": {
                    "type": attachment_type(&media.mime_type),
                    "payload": {
                        "url": media.url,
                        "is_reusable": true,
                    }
                }
            },
        });
        let result = self.post_message(&payload).await?;

        // Caption rides as its own message after the attachment.
        if let Some(caption) = media.caption.as_deref().filter(|c| !c.is_empty()) {
            let caption_result = self.send_text(target, caption).await?;
            debug!(
                attachment_id = %result.external_id,
                caption_id = %caption_result.external_id,
                "caption sent as follow-up message"
            );
        }

        Ok(result)
    }
}
