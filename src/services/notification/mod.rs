// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email and push notification dispatch.
//!
//! Providers are constructed once at startup and injected into [`Notifier`].
//! A channel without a provider reports [`NotificationError::NotConfigured`].

pub mod email;
pub mod push;
pub mod templates;

pub use email::SmtpMailer;
pub use push::FcmClient;

use crate::config::Config;
use crate::error::AppError;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Concurrent provider calls when fanning out to many devices.
const MAX_CONCURRENT_SENDS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("{0} service not configured")]
    NotConfigured(&'static str),

    #[error("{0}")]
    Provider(String),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotConfigured(_) => AppError::NotificationUnavailable(err.to_string()),
            NotificationError::Provider(msg) => AppError::Notification(msg),
        }
    }
}

/// A rendered email.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Push notification content.
#[derive(Debug, Clone, Default)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Extra key/value payload delivered to the app
    pub data: HashMap<String, String>,
}

/// Outcome of a single accepted push.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReceipt {
    pub message_id: String,
}

/// Per-token result of a fan-out operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub token: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result for multi-device sends and topic membership changes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<DeliveryResult>,
}

impl BatchReport {
    pub fn push(&mut self, result: DeliveryResult) {
        if result.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.responses.push(result);
    }
}

/// Outbound email provider.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError>;
}

/// Outbound push provider.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send_to_device(
        &self,
        token: &str,
        message: &PushMessage,
    ) -> Result<PushReceipt, NotificationError>;

    async fn send_to_topic(
        &self,
        topic: &str,
        message: &PushMessage,
    ) -> Result<PushReceipt, NotificationError>;

    async fn subscribe_to_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<BatchReport, NotificationError>;

    async fn unsubscribe_from_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<BatchReport, NotificationError>;

    /// Send the same message to every token. Individual failures are
    /// reported per token rather than failing the batch.
    async fn send_to_devices(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<BatchReport, NotificationError> {
        let results: Vec<DeliveryResult> = stream::iter(tokens.iter().cloned())
            .map(|token| async move {
                match self.send_to_device(&token, message).await {
                    Ok(receipt) => DeliveryResult {
                        token,
                        success: true,
                        message_id: Some(receipt.message_id),
                        error: None,
                    },
                    Err(e) => DeliveryResult {
                        token,
                        success: false,
                        message_id: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .buffer_unordered(MAX_CONCURRENT_SENDS)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for result in results {
            report.push(result);
        }
        Ok(report)
    }
}

/// Notification dispatcher shared by the services and handlers.
#[derive(Clone, Default)]
pub struct Notifier {
    email: Option<Arc<dyn EmailSender>>,
    push: Option<Arc<dyn PushSender>>,
}

impl Notifier {
    pub fn new(email: Option<Arc<dyn EmailSender>>, push: Option<Arc<dyn PushSender>>) -> Self {
        Self { email, push }
    }

    /// Notifier with no providers; every send reports `NotConfigured`.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build providers from configuration.
    ///
    /// A configured provider that cannot be constructed is an error; an
    /// unconfigured one is simply absent.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let email: Option<Arc<dyn EmailSender>> = match &config.smtp {
            Some(smtp) => {
                let mailer = SmtpMailer::new(smtp)?;
                // Unreachable relay is not fatal at startup
                if mailer.verify_connection().await {
                    tracing::info!(host = %smtp.host, port = smtp.port, "SMTP email enabled");
                } else {
                    tracing::warn!(host = %smtp.host, port = smtp.port, "SMTP relay not reachable at startup");
                }
                Some(Arc::new(mailer))
            }
            None => {
                tracing::warn!("SMTP credentials not configured; email disabled");
                None
            }
        };

        let push: Option<Arc<dyn PushSender>> = match &config.firebase {
            Some(firebase) => {
                let client = FcmClient::from_config(firebase).await?;
                tracing::info!(project = %client.project_id(), "FCM push enabled");
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("Firebase credentials not configured; push disabled");
                None
            }
        };

        Ok(Self { email, push })
    }

    pub fn email_enabled(&self) -> bool {
        self.email.is_some()
    }

    pub fn push_enabled(&self) -> bool {
        self.push.is_some()
    }

    pub fn email(&self) -> Result<&dyn EmailSender, NotificationError> {
        self.email
            .as_deref()
            .ok_or(NotificationError::NotConfigured("Email"))
    }

    pub fn push(&self) -> Result<&dyn PushSender, NotificationError> {
        self.push
            .as_deref()
            .ok_or(NotificationError::NotConfigured("Push notification"))
    }

    pub async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        self.email()?.send(message).await
    }

    /// Send the welcome email in a detached task.
    ///
    /// Failures are logged and never reach the caller. Returns the task
    /// handle, or `None` when email is not configured.
    pub fn send_welcome(&self, email: &str, name: &str) -> Option<JoinHandle<()>> {
        let Some(sender) = self.email.clone() else {
            tracing::debug!("Email disabled, skipping welcome email");
            return None;
        };

        let message = templates::welcome(email, name);
        Some(tokio::spawn(async move {
            match sender.send(message).await {
                Ok(()) => tracing::info!("Welcome email sent"),
                Err(e) => tracing::warn!(error = %e, "Failed to send welcome email"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingMailer {
        async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct FlakyPush;

    #[async_trait]
    impl PushSender for FlakyPush {
        async fn send_to_device(
            &self,
            token: &str,
            _message: &PushMessage,
        ) -> Result<PushReceipt, NotificationError> {
            if token.starts_with("bad") {
                Err(NotificationError::Provider("unregistered".to_string()))
            } else {
                Ok(PushReceipt {
                    message_id: format!("msg-{token}"),
                })
            }
        }

        async fn send_to_topic(
            &self,
            topic: &str,
            _message: &PushMessage,
        ) -> Result<PushReceipt, NotificationError> {
            Ok(PushReceipt {
                message_id: format!("topic-{topic}"),
            })
        }

        async fn subscribe_to_topic(
            &self,
            _tokens: &[String],
            _topic: &str,
        ) -> Result<BatchReport, NotificationError> {
            Ok(BatchReport::default())
        }

        async fn unsubscribe_from_topic(
            &self,
            _tokens: &[String],
            _topic: &str,
        ) -> Result<BatchReport, NotificationError> {
            Ok(BatchReport::default())
        }
    }

    #[tokio::test]
    async fn test_disabled_channels() {
        let notifier = Notifier::disabled();
        assert!(notifier.send_welcome("a@example.com", "A").is_none());

        let err = notifier
            .send_email(templates::welcome("a@example.com", "A"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotConfigured(_)));
        assert!(matches!(
            AppError::from(err),
            AppError::NotificationUnavailable(_)
        ));
        assert!(notifier.push().is_err());
    }

    #[tokio::test]
    async fn test_send_welcome_uses_template() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(Some(mailer.clone()), None);

        notifier
            .send_welcome("alice@example.com", "Alice")
            .unwrap()
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert!(sent[0].text.contains("Hello Alice!"));
    }

    #[tokio::test]
    async fn test_send_to_devices_reports_partial_failure() {
        let tokens = vec!["good1".to_string(), "bad1".to_string(), "good2".to_string()];
        let report = FlakyPush
            .send_to_devices(&tokens, &PushMessage::default())
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 1);
        let failed: Vec<_> = report.responses.iter().filter(|r| !r.success).collect();
        assert_eq!(failed[0].token, "bad1");
    }

    #[test]
    fn test_provider_error_maps_to_bad_gateway() {
        let err: AppError = NotificationError::Provider("smtp down".into()).into();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
