// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter over the Bot API.
//!
//! The send method is chosen by media type (`sendPhoto`, `sendVideo`,
//! `sendAudio`, `sendDocument`, `sendMessage`); media is passed as a URL
//! and fetched by Telegram's servers.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use omniroute_core::{ChannelAdapter, ChannelType, MediaPayload, OmnirouteError, SendResult};

const PROVIDER: &str = "telegram";

/// Client for one Telegram bot.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl TelegramClient {
    /// Creates a Bot API client. `base_url` is the API root without the
    /// `/bot{token}` segment.
    pub fn new(
        base_url: &str,
        bot_token: &str,
        timeout: Duration,
    ) -> Result<Self, OmnirouteError> {
        if bot_token.is_empty() {
            return Err(OmnirouteError::ChannelConfig {
                message: "missing credential field `bot_token`".into(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    async fn call_method(&self, method: &str, payload: &Value) -> Result<SendResult, OmnirouteError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.bot_token, method);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| OmnirouteError::api(PROVIDER, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            OmnirouteError::api(PROVIDER, format!("failed to read response body: {e}"))
        })?;

        let raw: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        // The Bot API reports errors both via HTTP status and `ok: false`
        // with a human-readable description.
        let ok = raw.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !ok {
            let detail = raw
                .get("description")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or(body);
            return Err(OmnirouteError::ExternalApi {
                provider: PROVIDER.to_string(),
                status: Some(status.as_u16()),
                detail,
            });
        }

        send_result(raw)
    }
}

/// Extract the provider message id from a Bot API response:
/// `{"ok": true, "result": {"message_id": 42}}`.
fn send_result(raw: Value) -> Result<SendResult, OmnirouteError> {
    let external_id = raw
        .pointer("/result/message_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| OmnirouteError::api(PROVIDER, "response is missing result.message_id"))?
        .to_string();
    Ok(SendResult { external_id, raw })
}

/// Pick the Bot API method and payload field for a media mime type.
fn media_method(mime_type: &str) -> (&'static str, &'static str) {
    if mime_type.starts_with("image/") {
        ("sendPhoto", "photo")
    } else if mime_type.starts_with("video/") {
        ("sendVideo", "video")
    } else if mime_type.starts_with("audio/") {
        ("sendAudio", "audio")
    } else {
        ("sendDocument", "document")
    }
}

#[async_trait]
impl ChannelAdapter for TelegramClient {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Telegram
    }

    async fn send_text(&self, target: &str, text: &str) -> Result<SendResult, OmnirouteError> {
        let payload = json!({
            "chat_id": target,
            "text": text,
        });
        self.call_method("sendMessage", &payload).await
    }

    async fn send_media(
        &self,
        target: &str,
        media: &MediaPayload,
    ) -> Result<SendResult, OmnirouteError> {
        let (method, field) = media_method(&media.mime_type);
        let mut payload = json!({ "chat_id": target });
        payload[field] = json!(media.url);
        if let Some(caption) = &media.caption {
            payload["caption"] = json!(caption);
        }
        self.call_method(method, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> TelegramClient {
        TelegramClient::new(base_url, "123:abc", Duration::from_secs(15)).unwrap()
    }

    fn ok_response(message_id: i64) -> serde_json::Value {
        json!({"ok": true, "result": {"message_id": message_id, "chat": {"id": 987}}})
    }

    #[test]
    fn empty_token_is_rejected() {
        let result = TelegramClient::new("https://api.telegram.org", "", Duration::from_secs(15));
        assert!(matches!(
            result,
            Err(OmnirouteError::ChannelConfig { .. })
        ));
    }

    #[test]
    fn method_selection_by_mime() {
        assert_eq!(media_method("image/png"), ("sendPhoto", "photo"));
        assert_eq!(media_method("video/mp4"), ("sendVideo", "video"));
        assert_eq!(media_method("audio/mpeg"), ("sendAudio", "audio"));
        assert_eq!(media_method("application/zip"), ("sendDocument", "document"));
    }

    #[tokio::test]
    async fn send_text_hits_token_scoped_path() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "987654",
                "text": "Oi!",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_response(42)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.send_text("987654", "Oi!").await.unwrap();
        assert_eq!(result.external_id, "42");
    }

    #[tokio::test]
    async fn photo_media_uses_send_photo_with_caption() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .and(body_partial_json(json!({
                "chat_id": "987654",
                "photo": "https://cdn.example.com/pic.png",
                "caption": "look",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_response(43)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let media = MediaPayload {
            url: "https://cdn.example.com/pic.png".into(),
            mime_type: "image/png".into(),
            caption: Some("look".into()),
            ..Default::default()
        };
        let result = client.send_media("987654", &media).await.unwrap();
        assert_eq!(result.external_id, "43");
    }

    #[tokio::test]
    async fn bot_api_description_is_surfaced_on_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send_text("0", "Oi!").await.unwrap_err();
        match err {
            OmnirouteError::ExternalApi { status, detail, .. } => {
                assert_eq!(status, Some(400));
                assert_eq!(detail, "Bad Request: chat not found");
            }
            other => panic!("expected ExternalApi, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ok_false_with_http_200_is_still_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send_text("987654", "Oi!").await.unwrap_err();
        assert!(err.to_string().contains("blocked"), "got: {err}");
    }
}
