//! Re-send through a transactional-email HTTP API (Resend-compatible).
//!
//! Builds a fresh message whose only attachment is the original as
//! `original.eml` (`message/rfc822`), so attachments and headers survive
//! even when the relay path would rewrite them.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::address::Address;
use crate::error::DeliveryError;
use crate::forward::ForwardAction;
use crate::message::InboundMessage;

pub const DEFAULT_API_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_FROM_NAME: &str = "Forwarded Message";

/// Re-send API settings.
#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_url: String,
    pub api_key: SecretString,
    /// Display name on the new From header.
    pub from_name: String,
    /// Mailbox the new message is sent from.
    pub from_address: String,
}

/// JSON body of one re-send request.
#[derive(Debug, Serialize)]
pub struct ResendEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub reply_to: String,
    pub headers: OriginalHeaders,
    pub text: String,
    pub attachments: Vec<ResendAttachment>,
}

#[derive(Debug, Serialize)]
pub struct OriginalHeaders {
    #[serde(rename = "X-Original-From")]
    pub original_from: String,
    #[serde(rename = "X-Original-To")]
    pub original_to: String,
}

#[derive(Debug, Serialize)]
pub struct ResendAttachment {
    pub filename: String,
    pub content: String,
    pub content_type: String,
}

pub struct ResendForward {
    config: ResendConfig,
    client: reqwest::Client,
}

impl ResendForward {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the request body for forwarding `message` to `target`.
    pub fn build_email(&self, message: &InboundMessage, target: &Address) -> ResendEmail {
        let subject = message.subject().unwrap_or("(no subject)");
        ResendEmail {
            from: format!("{} <{}>", self.config.from_name, self.config.from_address),
            to: vec![target.to_string()],
            subject: format!("FWD: {subject}"),
            reply_to: message.from.clone(),
            headers: OriginalHeaders {
                original_from: message.from.clone(),
                original_to: message.to.clone().unwrap_or_default(),
            },
            text: format!(
                "Forwarded message from {}\n\nFull email attached as original.eml",
                message.from
            ),
            attachments: vec![ResendAttachment {
                filename: "original.eml".into(),
                content: message.raw().to_base64(),
                content_type: "message/rfc822".into(),
            }],
        }
    }
}

#[async_trait]
impl ForwardAction for ResendForward {
    fn name(&self) -> &str {
        "resend"
    }

    async fn deliver(
        &self,
        message: &InboundMessage,
        target: &Address,
    ) -> Result<(), DeliveryError> {
        let email = self.build_email(message, target);

        let resp = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&email)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(forward_to = %target, status = %status, "Re-send accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "From: alice@example.com\r\nSubject: Invoice\r\n\r\nsee attached";

    fn forward() -> ResendForward {
        ResendForward::new(ResendConfig {
            api_url: "http://127.0.0.1:1/emails".into(),
            api_key: SecretString::from("re_test"),
            from_name: "Router".into(),
            from_address: "noreply@forward.example".into(),
        })
    }

    fn target(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn email_wraps_original_as_attachment() {
        let msg = InboundMessage::new("alice@example.com", RAW).with_to("billing@old.com");
        let email = forward().build_email(&msg, &target("team@new.com"));

        assert_eq!(email.from, "Router <noreply@forward.example>");
        assert_eq!(email.to, vec!["team@new.com".to_string()]);
        assert_eq!(email.subject, "FWD: Invoice");
        assert_eq!(email.reply_to, "alice@example.com");
        assert_eq!(email.headers.original_from, "alice@example.com");
        assert_eq!(email.headers.original_to, "billing@old.com");
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].filename, "original.eml");
        assert_eq!(email.attachments[0].content_type, "message/rfc822");
        assert_eq!(email.attachments[0].content, msg.raw().to_base64());
    }

    #[test]
    fn missing_subject_uses_placeholder() {
        let msg = InboundMessage::new("alice@example.com", "");
        let email = forward().build_email(&msg, &target("team@new.com"));
        assert_eq!(email.subject, "FWD: (no subject)");
        assert_eq!(email.headers.original_to, "");
    }

    #[test]
    fn json_body_uses_api_field_names() {
        let msg = InboundMessage::new("alice@example.com", RAW).with_to("a@old.com");
        let email = forward().build_email(&msg, &target("team@new.com"));
        let json = serde_json::to_value(&email).unwrap();

        assert_eq!(json["headers"]["X-Original-From"], "alice@example.com");
        assert_eq!(json["headers"]["X-Original-To"], "a@old.com");
        assert_eq!(json["attachments"][0]["content_type"], "message/rfc822");
        assert_eq!(
            json["text"],
            "Forwarded message from alice@example.com\n\nFull email attached as original.eml"
        );
    }

    #[tokio::test]
    async fn transport_error_is_returned_not_panicked() {
        let msg = InboundMessage::new("alice@example.com", RAW);
        let result = forward().deliver(&msg, &target("team@new.com")).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
    }
}
