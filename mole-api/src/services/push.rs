//! Push notifications to patient devices.

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use super::metrics::PUSH_NOTIFICATIONS_TOTAL;

const FCM_API_URL: &str = "https://fcm.googleapis.com/v1/projects";

/// Attempts made for one notification before giving up.
pub const PUSH_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push provider not configured: {0}")]
    Configuration(String),

    #[error("Failed to reach push provider: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Push provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    /// Topic the recipient's devices subscribe to; the account id.
    pub recipient: String,
    pub data: HashMap<String, String>,
}

impl PushMessage {
    pub fn text(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            data: HashMap::from([("message".to_string(), message.into())]),
        }
    }
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError>;
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    topic: &'a str,
    data: &'a HashMap<String, String>,
}

pub struct FcmProvider {
    project_id: String,
    access_token: Secret<String>,
    client: reqwest::Client,
}

impl FcmProvider {
    pub fn new(project_id: impl Into<String>, access_token: Secret<String>) -> Result<Self, PushError> {
        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(PushError::Configuration("FCM project id is empty".to_string()));
        }
        Ok(Self {
            project_id,
            access_token,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        let url = format!("{}/{}/messages:send", FCM_API_URL, self.project_id);
        let body = FcmRequest {
            message: FcmMessage {
                topic: &message.recipient,
                data: &message.data,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected { status, body });
        }

        tracing::info!(recipient = %message.recipient, "Push notification sent via FCM");
        Ok(())
    }
}

/// Send with exponential backoff, bounded to `attempts` tries.
pub async fn send_with_retry(
    provider: &dyn PushProvider,
    message: &PushMessage,
    attempts: u32,
) -> Result<(), PushError> {
    let counter = AtomicU32::new(0);
    let tried = &counter;
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_secs(2),
        max_elapsed_time: Some(Duration::from_secs(10)),
        ..Default::default()
    };

    let result = retry(policy, || async move {
        let attempt = tried.fetch_add(1, Ordering::SeqCst) + 1;
        provider.send(message).await.map_err(|e| {
            tracing::debug!(attempt, error = %e, "Push attempt failed");
            if attempt >= attempts {
                backoff::Error::permanent(e)
            } else {
                backoff::Error::transient(e)
            }
        })
    })
    .await;

    let outcome = if result.is_ok() { "sent" } else { "failed" };
    metrics::counter!(PUSH_NOTIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
    result
}

/// Records sends; can be told to fail a number of times first.
#[derive(Default)]
pub struct MockPushProvider {
    send_count: AtomicU64,
    failures_left: AtomicU64,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u64) -> Self {
        Self {
            send_count: AtomicU64::new(0),
            failures_left: AtomicU64::new(times),
        }
    }

    /// Every call, successful or not.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PushError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        tracing::info!(recipient = %message.recipient, "[MOCK] Push notification would be sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retries_until_success() {
        let provider = MockPushProvider::failing(2);
        let message = PushMessage::text("account", "Your results are ready");

        send_with_retry(&provider, &message, PUSH_ATTEMPTS).await.unwrap();
        assert_eq!(provider.send_count(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let provider = MockPushProvider::failing(10);
        let message = PushMessage::text("account", "hello");

        let result = send_with_retry(&provider, &message, PUSH_ATTEMPTS).await;
        assert!(matches!(result, Err(PushError::Rejected { status: 503, .. })));
        assert_eq!(provider.send_count(), 3);
    }

    #[test]
    fn fcm_body_targets_account_topic() {
        let message = PushMessage::text("0b6d8a8e", "done");
        let body = serde_json::to_value(FcmRequest {
            message: FcmMessage {
                topic: &message.recipient,
                data: &message.data,
            },
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"message": {"topic": "0b6d8a8e", "data": {"message": "done"}}})
        );
    }
}
