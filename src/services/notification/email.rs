// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SMTP email delivery.

use super::{EmailMessage, EmailSender, NotificationError};
use crate::config::SmtpConfig;
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Email sender backed by an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .with_context(|| format!("invalid SMTP_FROM_EMAIL '{}'", config.from_email))?;

        // Port 465 style implicit TLS, otherwise upgrade with STARTTLS
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .with_context(|| format!("invalid SMTP host '{}'", config.host))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, from })
    }

    /// Check that the relay accepts a connection and our credentials.
    pub async fn verify_connection(&self) -> bool {
        match self.transport.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(error = %e, "SMTP connection verification failed");
                false
            }
        }
    }

    fn build_message(&self, message: EmailMessage) -> Result<Message, NotificationError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotificationError::Provider(format!("invalid recipient: {e}")))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject);

        let built = match message.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(message.text, html)),
            None => builder.body(message.text),
        };

        built.map_err(|e| NotificationError::Provider(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        let email = self.build_message(message)?;

        let response = self.transport.send(email).await.map_err(|e| {
            tracing::error!(error = %e, "Email sending failed");
            NotificationError::Provider(format!("Email sending failed: {e}"))
        })?;

        tracing::debug!(code = %response.code(), "Email accepted by relay");
        Ok(())
    }
}
