//! Fire-and-forget notification dispatch.
//!
//! In-app notifications go through a fixed [`NotificationSink`]; push delivery
//! is a [`PushNotifier`] chosen once at startup and may be a no-op.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::queries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    BookingAssigned,
    BookingAccepted,
    BookingRejected,
    BookingStarted,
    BookingCompleted,
    BookingCancelled,
    ExtensionRequested,
    RechargeApproved,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::BookingAssigned => "booking_assigned",
            NotificationEvent::BookingAccepted => "booking_accepted",
            NotificationEvent::BookingRejected => "booking_rejected",
            NotificationEvent::BookingStarted => "booking_started",
            NotificationEvent::BookingCompleted => "booking_completed",
            NotificationEvent::BookingCancelled => "booking_cancelled",
            NotificationEvent::ExtensionRequested => "extension_requested",
            NotificationEvent::RechargeApproved => "recharge_approved",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationEvent::BookingAssigned => "New booking assigned to you",
            NotificationEvent::BookingAccepted => "Your booking was accepted",
            NotificationEvent::BookingRejected => "Your booking was declined",
            NotificationEvent::BookingStarted => "Your service has started",
            NotificationEvent::BookingCompleted => "Your service is complete",
            NotificationEvent::BookingCancelled => "Booking cancelled",
            NotificationEvent::ExtensionRequested => "Extension requested",
            NotificationEvent::RechargeApproved => "Recharge approved",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEntry {
    pub recipient: Uuid,
    pub event: NotificationEvent,
    pub title: String,
    pub payload: Value,
}

impl NotificationEntry {
    pub fn new(recipient: Uuid, event: NotificationEvent, payload: Value) -> Self {
        Self {
            recipient,
            event,
            title: event.title().to_string(),
            payload,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create_many(&self, entries: &[NotificationEntry]) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn push(&self, entry: &NotificationEntry) -> anyhow::Result<()>;
}

/// Persists in-app notifications in the `notifications` table.
#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn create_many(&self, entries: &[NotificationEntry]) -> anyhow::Result<u64> {
        Ok(queries::insert_notifications(&self.pool, entries).await?)
    }
}

/// Used when no push provider is configured.
pub struct NoopPush;

#[async_trait]
impl PushNotifier for NoopPush {
    async fn push(&self, _entry: &NotificationEntry) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Posts each notification as JSON to a push gateway.
pub struct WebhookPush {
    client: Client,
    url: String,
}

impl WebhookPush {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl PushNotifier for WebhookPush {
    async fn push(&self, entry: &NotificationEntry) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "user_id": entry.recipient,
                "event": entry.event,
                "title": entry.title,
                "data": entry.payload,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("push gateway returned status {}", response.status());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    push: Arc<dyn PushNotifier>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, push: Arc<dyn PushNotifier>) -> Self {
        Self { sink, push }
    }

    pub fn from_config(pool: PgPool, push_webhook_url: Option<&str>) -> Self {
        let push: Arc<dyn PushNotifier> = match push_webhook_url {
            Some(url) => {
                tracing::info!("Push notifications enabled via webhook");
                Arc::new(WebhookPush::new(url.to_string()))
            }
            None => {
                tracing::info!("Push notifications disabled");
                Arc::new(NoopPush)
            }
        };
        Self::new(Arc::new(PgNotificationSink::new(pool)), push)
    }

    /// Hands the entries to a background task. Never fails the caller.
    pub fn notify(&self, entries: Vec<NotificationEntry>) {
        if entries.is_empty() {
            return;
        }
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.deliver(&entries).await;
        });
    }

    pub async fn deliver(&self, entries: &[NotificationEntry]) {
        if let Err(e) = self.sink.create_many(entries).await {
            tracing::warn!("Failed to store {} notification(s): {}", entries.len(), e);
        }
        for entry in entries {
            if let Err(e) = self.push.push(entry).await {
                tracing::warn!(
                    recipient = %entry.recipient,
                    event = entry.event.as_str(),
                    "Push delivery failed: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) entries: Mutex<Vec<NotificationEntry>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn create_many(&self, entries: &[NotificationEntry]) -> anyhow::Result<u64> {
            let mut stored = self.entries.lock().unwrap();
            stored.extend_from_slice(entries);
            Ok(entries.len() as u64)
        }
    }

    struct FailingPush;

    #[async_trait]
    impl PushNotifier for FailingPush {
        async fn push(&self, _entry: &NotificationEntry) -> anyhow::Result<()> {
            anyhow::bail!("gateway down")
        }
    }

    #[tokio::test]
    async fn test_deliver_stores_entries_even_when_push_fails() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(sink.clone(), Arc::new(FailingPush));
        let recipient = Uuid::new_v4();

        dispatcher
            .deliver(&[NotificationEntry::new(
                recipient,
                NotificationEvent::BookingAccepted,
                json!({"booking_id": Uuid::new_v4()}),
            )])
            .await;

        let stored = sink.entries.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].recipient, recipient);
        assert_eq!(stored[0].title, "Your booking was accepted");
    }

    #[tokio::test]
    async fn test_webhook_push_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/push")
            .match_body(mockito::Matcher::PartialJson(json!({"event": "booking_started"})))
            .with_status(200)
            .create_async()
            .await;

        let push = WebhookPush::new(format!("{}/push", server.url()));
        let entry = NotificationEntry::new(Uuid::new_v4(), NotificationEvent::BookingStarted, json!({}));
        push.push(&entry).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_event_names() {
        assert_eq!(NotificationEvent::BookingCancelled.as_str(), "booking_cancelled");
        assert_eq!(
            serde_json::to_value(NotificationEvent::ExtensionRequested).unwrap(),
            json!("extension_requested")
        );
    }
}
