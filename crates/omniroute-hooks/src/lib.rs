// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous fan-out of internal events to user-registered webhooks.
//!
//! [`WebhookDispatcher`] keeps an in-process FIFO of events. A single drain
//! worker pops one event at a time, fans it out to every matching webhook
//! concurrently, and waits for the whole wave before advancing -- cross-event
//! ordering is preserved while within-event delivery is unordered. Failed
//! deliveries are logged, never retried.

pub mod delivery;
pub mod signing;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use omniroute_config::model::WebhookConfig;
use omniroute_core::types::EventType;
use omniroute_core::OmnirouteError;
use omniroute_storage::queries::webhooks;
use omniroute_storage::{now_iso, Database};

/// One internal event waiting for fan-out.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub user_id: String,
    pub event: EventType,
    pub payload: Value,
    pub channel_id: Option<String>,
}

/// The webhook dispatch queue.
///
/// `enqueue` is safe to call from any task; the drain worker never overlaps
/// itself (the `processing` guard), bounding outbound concurrency to one
/// event's fan-out width at a time.
pub struct WebhookDispatcher {
    db: Arc<Database>,
    http: reqwest::Client,
    queue: Mutex<VecDeque<QueuedEvent>>,
    processing: AtomicBool,
    timeout: Duration,
    log_retention: u32,
}

impl WebhookDispatcher {
    /// Construct a dispatcher over the given store.
    pub fn new(db: Arc<Database>, config: &WebhookConfig) -> Result<Arc<Self>, OmnirouteError> {
        // Delivery timeouts are enforced per-request around `send`, not on
        // the client, so a slow subscriber cannot consume another's budget.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| OmnirouteError::Webhook {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Arc::new(Self {
            db,
            http,
            queue: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            timeout: Duration::from_secs(config.timeout_secs),
            log_retention: config.log_retention,
        }))
    }

    /// Append an event to the queue and start the drain worker if idle.
    pub fn enqueue(
        self: &Arc<Self>,
        user_id: &str,
        event: EventType,
        payload: Value,
        channel_id: Option<&str>,
    ) {
        self.queue
            .lock()
            .expect("webhook queue poisoned")
            .push_back(QueuedEvent {
                user_id: user_id.to_string(),
                event,
                payload,
                channel_id: channel_id.map(String::from),
            });
        self.try_start_drain();
    }

    /// Wait until the queue is empty and the drain worker has parked.
    ///
    /// Used by tests and by graceful shutdown to let in-flight deliveries
    /// finish.
    pub async fn wait_idle(&self) {
        loop {
            let empty = self.queue.lock().expect("webhook queue poisoned").is_empty();
            if empty && !self.processing.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn try_start_drain(self: &Arc<Self>) {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.drain().await;
            });
        }
    }

    /// Pop-and-dispatch loop. Strict FIFO across events; exits when the
    /// queue is observed empty.
    async fn drain(self: Arc<Self>) {
        loop {
            let next = self
                .queue
                .lock()
                .expect("webhook queue poisoned")
                .pop_front();

            match next {
                Some(event) => self.dispatch_event(event).await,
                None => {
                    self.processing.store(false, Ordering::SeqCst);
                    // An enqueue may have landed between the pop and the
                    // store; reclaim the guard or leave it to that caller.
                    let has_work =
                        !self.queue.lock().expect("webhook queue poisoned").is_empty();
                    if !has_work
                        || self
                            .processing
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }

    /// Fan one event out to all matching webhooks and wait for every
    /// delivery to settle.
    async fn dispatch_event(&self, event: QueuedEvent) {
        let matches = match webhooks::find_active_by_event(
            &self.db,
            &event.user_id,
            event.event,
            event.channel_id.as_deref(),
        )
        .await
        {
            Ok(matches) => matches,
            Err(e) => {
                error!(error = %e, event = %event.event, "webhook lookup failed, dropping event");
                return;
            }
        };

        if matches.is_empty() {
            return;
        }

        let event_name = event.event.to_string();
        let timestamp = now_iso();
        let body = build_body(&event, &event_name, &timestamp).to_string();

        debug!(
            event = %event_name,
            subscribers = matches.len(),
            "dispatching webhook wave"
        );

        let deliveries = matches.iter().map(|webhook| {
            let body = body.as_str();
            let event_name = event_name.as_str();
            let timestamp = timestamp.as_str();
            async move {
                let record = delivery::deliver(
                    &self.http,
                    webhook,
                    event_name,
                    timestamp,
                    body,
                    self.timeout,
                )
                .await;
                if let Err(e) = webhooks::record_delivery(
                    &self.db,
                    &webhook.id,
                    &record,
                    self.log_retention,
                    timestamp,
                )
                .await
                {
                    warn!(webhook_id = %webhook.id, error = %e, "failed to record delivery");
                }
            }
        });

        join_all(deliveries).await;
    }
}

/// Assemble the outbound body: `{event, timestamp, data, channel?,
/// conversation?, message?, contact?}`.
///
/// Known entity keys inside the payload are lifted to the top level for
/// subscribers that match on them without unpacking `data`.
fn build_body(event: &QueuedEvent, event_name: &str, timestamp: &str) -> Value {
    let mut body = json!({
        "event": event_name,
        "timestamp": timestamp,
        "data": event.payload,
    });
    if let Some(channel_id) = &event.channel_id {
        body["channel"] = json!(channel_id);
    }
    for key in ["conversation", "message", "contact"] {
        if let Some(value) = event.payload.get(key) {
            body[key] = value.clone();
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use omniroute_core::types::UserWebhook;
    use omniroute_storage::queries::webhooks::{create_webhook, get_logs, get_webhook};
    use std::collections::HashMap;
    use tempfile::tempdir;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_db() -> (Arc<Database>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (Arc::new(db), dir)
    }

    fn test_config() -> WebhookConfig {
        WebhookConfig {
            timeout_secs: 5,
            log_retention: 100,
        }
    }

    fn make_webhook(id: &str, url: &str, channel_ids: Vec<String>) -> UserWebhook {
        UserWebhook {
            id: id.to_string(),
            user_id: "u-1".to_string(),
            url: url.to_string(),
            events: vec![EventType::MessageSent, EventType::MessageReceived],
            headers: HashMap::new(),
            secret: None,
            channel_ids,
            is_active: true,
            trigger_count: 0,
            last_triggered_at: None,
            last_error: None,
            created_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn fan_out_respects_channel_filter() {
        let (db, _dir) = setup_db().await;
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/all"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/c1-only"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let all = make_webhook("wh-all", &format!("{}/all", server.uri()), vec![]);
        let filtered = make_webhook(
            "wh-c1",
            &format!("{}/c1-only", server.uri()),
            vec!["C1".to_string()],
        );
        create_webhook(&db, &all).await.unwrap();
        create_webhook(&db, &filtered).await.unwrap();

        let dispatcher = WebhookDispatcher::new(Arc::clone(&db), &test_config()).unwrap();
        dispatcher.enqueue(
            "u-1",
            EventType::MessageSent,
            json!({"message": {"id": "m-1"}}),
            Some("C2"),
        );
        dispatcher.wait_idle().await;
    }

    #[tokio::test]
    async fn delivery_carries_event_headers_and_signature() {
        let (db, _dir) = setup_db().await;
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/in"))
            .and(header("X-Webhook-Event", "message.sent"))
            .and(header("Content-Type", "application/json"))
            .and(header_exists("X-Webhook-Timestamp"))
            .and(header_exists("X-Webhook-Signature"))
            .and(header("X-Webhook-Secret", "s3cret"))
            .and(header("X-Team", "support"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut webhook = make_webhook("wh-1", &format!("{}/in", server.uri()), vec![]);
        webhook.secret = Some("s3cret".to_string());
        webhook
            .headers
            .insert("X-Team".to_string(), "support".to_string());
        create_webhook(&db, &webhook).await.unwrap();

        let dispatcher = WebhookDispatcher::new(Arc::clone(&db), &test_config()).unwrap();
        dispatcher.enqueue("u-1", EventType::MessageSent, json!({}), None);
        dispatcher.wait_idle().await;

        // Signature matches the exact delivered body.
        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let signature = requests[0]
            .headers
            .get("X-Webhook-Signature")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(signature, signing::signature_header("s3cret", &body));
    }

    #[tokio::test]
    async fn events_drain_in_fifo_order() {
        let (db, _dir) = setup_db().await;
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/in"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
            .expect(2)
            .mount(&server)
            .await;

        let webhook = make_webhook("wh-1", &format!("{}/in", server.uri()), vec![]);
        create_webhook(&db, &webhook).await.unwrap();

        let dispatcher = WebhookDispatcher::new(Arc::clone(&db), &test_config()).unwrap();
        dispatcher.enqueue("u-1", EventType::MessageReceived, json!({"n": 1}), None);
        dispatcher.enqueue("u-1", EventType::MessageSent, json!({"n": 2}), None);
        dispatcher.wait_idle().await;

        let requests = server.received_requests().await.unwrap();
        let events: Vec<&str> = requests
            .iter()
            .map(|r| r.headers.get("X-Webhook-Event").unwrap().to_str().unwrap())
            .collect();
        assert_eq!(events, vec!["message.received", "message.sent"]);
    }

    #[tokio::test]
    async fn failed_delivery_is_logged_not_retried() {
        let (db, _dir) = setup_db().await;
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/in"))
            .respond_with(ResponseTemplate::new(500).set_body_string("subscriber broke"))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = make_webhook("wh-1", &format!("{}/in", server.uri()), vec![]);
        create_webhook(&db, &webhook).await.unwrap();

        let dispatcher = WebhookDispatcher::new(Arc::clone(&db), &test_config()).unwrap();
        dispatcher.enqueue("u-1", EventType::MessageSent, json!({}), None);
        dispatcher.wait_idle().await;

        let logs = get_logs(&db, "wh-1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].response_status, Some(500));
        assert_eq!(logs[0].error.as_deref(), Some("HTTP 500 Internal Server Error"));

        let stored = get_webhook(&db, "wh-1").await.unwrap().unwrap();
        assert_eq!(stored.trigger_count, 1);
        assert!(stored.last_error.is_some());
    }

    #[tokio::test]
    async fn successful_delivery_updates_counters_and_clears_error() {
        let (db, _dir) = setup_db().await;
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/in"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = make_webhook("wh-1", &format!("{}/in", server.uri()), vec![]);
        create_webhook(&db, &webhook).await.unwrap();

        let dispatcher = WebhookDispatcher::new(Arc::clone(&db), &test_config()).unwrap();
        dispatcher.enqueue(
            "u-1",
            EventType::MessageSent,
            json!({"message": {"id": "m-1"}}),
            Some("C1"),
        );
        dispatcher.wait_idle().await;

        let stored = get_webhook(&db, "wh-1").await.unwrap().unwrap();
        assert_eq!(stored.trigger_count, 1);
        assert!(stored.last_error.is_none());
        assert!(stored.last_triggered_at.is_some());
    }

    #[test]
    fn body_lifts_known_entities_and_channel() {
        let event = QueuedEvent {
            user_id: "u-1".to_string(),
            event: EventType::MessageSent,
            payload: json!({
                "message": {"id": "m-1"},
                "conversation": {"id": "c-1"},
            }),
            channel_id: Some("ch-1".to_string()),
        };
        let body = build_body(&event, "message.sent", "2026-02-01T10:00:00.000Z");
        assert_eq!(body["event"], "message.sent");
        assert_eq!(body["channel"], "ch-1");
        assert_eq!(body["message"]["id"], "m-1");
        assert_eq!(body["conversation"]["id"], "c-1");
        assert_eq!(body["data"]["message"]["id"], "m-1");
        assert!(body.get("contact").is_none());
    }
}
