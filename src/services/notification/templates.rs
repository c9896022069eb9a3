// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional email bodies.

use super::EmailMessage;
use chrono::{Datelike, Utc};

const APP_NAME: &str = "User Auth API";

const BASE_STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.content { padding: 20px; background: #f9f9f9; }
.footer { text-align: center; padding: 20px; font-size: 12px; color: #666; }
.button { display: inline-block; padding: 12px 24px; color: white; text-decoration: none; border-radius: 4px; margin: 20px 0; }";

/// Escape text for interpolation into HTML.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a content fragment in the shared page layout.
fn layout(header: Option<(&str, &str)>, content: &str) -> String {
    let header = header
        .map(|(title, color)| {
            format!(
                r#"<div style="background: {color}; color: white; padding: 20px; text-align: center;"><h1>{}</h1></div>"#,
                escape_html(title)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head><style>{BASE_STYLE}</style></head>
  <body>
    <div class="container">
      {header}
      <div class="content">{content}</div>
      <div class="footer"><p>&copy; {year} {APP_NAME}. All rights reserved.</p></div>
    </div>
  </body>
</html>"#,
        year = Utc::now().year(),
    )
}

pub fn welcome(to: &str, name: &str) -> EmailMessage {
    let safe_name = escape_html(name);
    let html = layout(
        Some((&format!("Welcome to {APP_NAME}!"), "#4CAF50")),
        &format!(
            "<h2>Hello {safe_name}!</h2>\
             <p>Thank you for registering with us. We're excited to have you on board!</p>\
             <p>Your account has been successfully created and you can now start using our services.</p>\
             <p>If you have any questions, feel free to reach out to our support team.</p>"
        ),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Welcome to {APP_NAME}!"),
        text: format!(
            "Hello {name}!\n\nThank you for registering with us. We're excited to have you on board!\n\n\
             Your account has been successfully created and you can now start using our services."
        ),
        html: Some(html),
    }
}

pub fn password_reset(to: &str, name: &str, reset_url: &str) -> EmailMessage {
    let safe_name = escape_html(name);
    let safe_url = escape_html(reset_url);
    let html = layout(
        Some(("Password Reset Request", "#2196F3")),
        &format!(
            "<h2>Hello {safe_name},</h2>\
             <p>We received a request to reset your password. Click the button below to reset it:</p>\
             <a href=\"{safe_url}\" class=\"button\" style=\"background: #2196F3;\">Reset Password</a>\
             <p>Or copy and paste this link into your browser:</p>\
             <p>{safe_url}</p>\
             <p style=\"color: #f44336; font-weight: bold;\">This link will expire in 1 hour.</p>\
             <p>If you didn't request a password reset, please ignore this email or contact support if you have concerns.</p>"
        ),
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        text: format!(
            "Hello {name},\n\nWe received a request to reset your password.\n\n\
             Reset your password here: {reset_url}\n\nThis link will expire in 1 hour.\n\n\
             If you didn't request a password reset, please ignore this email."
        ),
        html: Some(html),
    }
}

pub fn verification(to: &str, name: &str, verification_url: &str) -> EmailMessage {
    let safe_name = escape_html(name);
    let safe_url = escape_html(verification_url);
    let html = layout(
        Some(("Verify Your Email", "#FF9800")),
        &format!(
            "<h2>Hello {safe_name},</h2>\
             <p>Thank you for registering! Please verify your email address by clicking the button below:</p>\
             <a href=\"{safe_url}\" class=\"button\" style=\"background: #FF9800;\">Verify Email</a>\
             <p>Or copy and paste this link into your browser:</p>\
             <p>{safe_url}</p>\
             <p>If you didn't create an account, please ignore this email.</p>"
        ),
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Verify Your Email Address".to_string(),
        text: format!(
            "Hello {name},\n\nThank you for registering! Please verify your email address:\n\n\
             {verification_url}\n\nIf you didn't create an account, please ignore this email."
        ),
        html: Some(html),
    }
}

/// Administrator-authored message. `message` may contain HTML and is
/// inserted as-is.
pub fn custom(to: &str, subject: &str, message: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        text: message.to_string(),
        html: Some(layout(None, message)),
    }
}
