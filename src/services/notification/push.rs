// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Cloud Messaging (HTTP v1) push delivery.
//!
//! Authenticates as a service account: a self-signed RS256 assertion is
//! exchanged for an OAuth access token, which is cached until shortly
//! before it expires.

use super::{BatchReport, DeliveryResult, NotificationError, PushMessage, PushReceipt, PushSender};
use crate::config::{FirebaseConfig, FirebaseCredentials};
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const FCM_BASE_URL: &str = "https://fcm.googleapis.com/v1/projects";
const IID_BASE_URL: &str = "https://iid.googleapis.com/iid/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh the cached OAuth token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Subset of a Google service account key file.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    project_id: Option<String>,
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct TopicResponse {
    #[serde(default)]
    results: Vec<TopicResult>,
}

#[derive(Deserialize)]
struct TopicResult {
    error: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Where a message is delivered.
enum Target<'a> {
    Device(&'a str),
    Topic(&'a str),
}

/// FCM HTTP v1 client.
pub struct FcmClient {
    http: reqwest::Client,
    project_id: String,
    client_email: String,
    signing_key: EncodingKey,
    token_uri: String,
    cached_token: Mutex<Option<CachedToken>>,
}

impl FcmClient {
    /// Create a client from inline service account fields.
    pub fn new(
        project_id: impl Into<String>,
        client_email: impl Into<String>,
        private_key_pem: &str,
    ) -> anyhow::Result<Self> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            anyhow::bail!("Firebase project id must not be empty");
        }

        let signing_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .context("invalid Firebase private key (expected RSA PEM)")?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building FCM HTTP client")?;

        Ok(Self {
            http,
            project_id,
            client_email: client_email.into(),
            signing_key,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            cached_token: Mutex::new(None),
        })
    }

    /// Create a client from configuration, reading the service account file
    /// when one is configured.
    pub async fn from_config(config: &FirebaseConfig) -> anyhow::Result<Self> {
        match &config.credentials {
            FirebaseCredentials::Inline {
                client_email,
                private_key,
            } => {
                let project_id = config
                    .project_id
                    .clone()
                    .context("FIREBASE_PROJECT_ID is required with inline credentials")?;
                Self::new(project_id, client_email.clone(), private_key)
            }
            FirebaseCredentials::ServiceAccountFile(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed reading {}", path.display()))?;
                let key: ServiceAccountKey = serde_json::from_str(&raw)
                    .with_context(|| format!("failed parsing {}", path.display()))?;

                let project_id = config
                    .project_id
                    .clone()
                    .or(key.project_id)
                    .context("service account file has no project_id")?;

                let mut client = Self::new(project_id, key.client_email, &key.private_key)?;
                if let Some(token_uri) = key.token_uri {
                    client.token_uri = token_uri;
                }
                Ok(client)
            }
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Get a valid OAuth access token, refreshing if needed.
    async fn access_token(&self) -> Result<String, NotificationError> {
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: FCM_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| NotificationError::Provider(format!("failed to sign assertion: {e}")))?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(provider_err)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "FCM OAuth token exchange failed");
            return Err(NotificationError::Provider(format!(
                "token exchange failed with status {status}"
            )));
        }

        let token: OAuthTokenResponse = response.json().await.map_err(provider_err)?;
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        tracing::debug!(expires_in = token.expires_in, "Refreshed FCM access token");
        Ok(value)
    }

    async fn send(&self, target: Target<'_>, message: &PushMessage) -> Result<PushReceipt, NotificationError> {
        let url = format!("{}/{}/messages:send", FCM_BASE_URL, self.project_id);
        let token = self.access_token().await?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&message_body(target, message))
            .send()
            .await
            .map_err(provider_err)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "FCM send failed");
            return Err(NotificationError::Provider(format!(
                "FCM send failed with status {status}"
            )));
        }

        let sent: SendResponse = response.json().await.map_err(provider_err)?;
        Ok(PushReceipt {
            message_id: sent.name,
        })
    }

    /// Add or remove tokens from a topic via the instance ID API.
    async fn manage_topic(
        &self,
        action: &str,
        tokens: &[String],
        topic: &str,
    ) -> Result<BatchReport, NotificationError> {
        let topic = normalize_topic(topic)?;
        let url = format!("{}:{}", IID_BASE_URL, action);
        let token = self.access_token().await?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("access_token_auth", "true")
            .json(&json!({
                "to": format!("/topics/{topic}"),
                "registration_tokens": tokens,
            }))
            .send()
            .await
            .map_err(provider_err)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(NotificationError::Provider(format!(
                "topic {action} failed with status {status}"
            )));
        }

        let body: TopicResponse = response.json().await.map_err(provider_err)?;

        let mut report = BatchReport::default();
        for (token, result) in tokens.iter().zip(body.results) {
            report.push(DeliveryResult {
                token: token.clone(),
                success: result.error.is_none(),
                message_id: None,
                error: result.error,
            });
        }
        Ok(report)
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send_to_device(
        &self,
        token: &str,
        message: &PushMessage,
    ) -> Result<PushReceipt, NotificationError> {
        self.send(Target::Device(token), message).await
    }

    async fn send_to_topic(
        &self,
        topic: &str,
        message: &PushMessage,
    ) -> Result<PushReceipt, NotificationError> {
        let topic = normalize_topic(topic)?;
        self.send(Target::Topic(topic), message).await
    }

    async fn subscribe_to_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<BatchReport, NotificationError> {
        self.manage_topic("batchAdd", tokens, topic).await
    }

    async fn unsubscribe_from_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<BatchReport, NotificationError> {
        self.manage_topic("batchRemove", tokens, topic).await
    }
}

fn provider_err(e: reqwest::Error) -> NotificationError {
    NotificationError::Provider(e.to_string())
}

/// Accept `news` or `/topics/news`; reject names FCM would refuse.
fn normalize_topic(topic: &str) -> Result<&str, NotificationError> {
    let name = topic.strip_prefix("/topics/").unwrap_or(topic);
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'));
    if valid {
        Ok(name)
    } else {
        Err(NotificationError::Provider(format!(
            "invalid topic name '{topic}'"
        )))
    }
}

fn message_body(target: Target<'_>, message: &PushMessage) -> serde_json::Value {
    let mut body = json!({
        "notification": {
            "title": message.title,
            "body": message.body,
        },
        "data": message.data,
        "android": {
            "priority": "high",
            "notification": { "sound": "default" },
        },
        "apns": {
            "payload": { "aps": { "sound": "default", "badge": 1 } },
        },
    });

    match target {
        Target::Device(token) => body["token"] = json!(token),
        Target::Topic(topic) => body["topic"] = json!(topic),
    }

    json!({ "message": body })
}
