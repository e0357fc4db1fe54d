//! Webhook notifications for newly downloaded transcripts.

use chrono::{DateTime, Utc};
use reqwest::Client;
use sejmbot_core::Error;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    timestamp: DateTime<Utc>,
    scheduler_term: u32,
}

/// Posts a short JSON message to a webhook (Slack-compatible `text` field).
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    webhook: String,
    term: u32,
}

impl Notifier {
    pub fn new(webhook: impl Into<String>, term: u32, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build webhook client: {e}")))?;
        Ok(Self { client, webhook: webhook.into(), term })
    }

    pub async fn send(&self, text: &str) -> Result<(), Error> {
        let payload = WebhookPayload { text, timestamp: Utc::now(), scheduler_term: self.term };
        let response = self.client.post(&self.webhook).json(&payload).send().await.map_err(|e| {
            if e.is_timeout() { Error::Timeout(e.to_string()) } else { Error::ConnectionFailed(e.to_string()) }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus { status: status.as_u16(), url: self.webhook.clone() });
        }

        tracing::info!(term = self.term, "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_posts_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "text": "2 nowe dni",
                "scheduler_term": 10
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let notifier = Notifier::new(format!("{}/hook", server.url()), 10, Duration::from_secs(5)).unwrap();
        notifier.send("2 nowe dni").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/hook").with_status(500).create_async().await;

        let notifier = Notifier::new(format!("{}/hook", server.url()), 10, Duration::from_secs(5)).unwrap();
        let err = notifier.send("x").await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    }
}
