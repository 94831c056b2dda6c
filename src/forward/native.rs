//! Native forward: relay the original message bytes unchanged over SMTP.
//!
//! Only the envelope is new (sender, single target recipient); headers,
//! body and attachments go out exactly as received.

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::address::Address;
use crate::error::DeliveryError;
use crate::forward::ForwardAction;
use crate::message::InboundMessage;

/// Port where the connection is TLS from the first byte.
pub const SUBMISSIONS_PORT: u16 = 465;

/// How the relay connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plaintext greeting, then upgrade with STARTTLS (587, 25).
    Starttls,
    /// TLS handshake before any SMTP traffic (465).
    Wrapper,
    /// No encryption. Only for a local MTA.
    None,
}

impl SmtpTls {
    /// The usual mode for a relay port.
    pub fn for_port(port: u16) -> Self {
        if port == SUBMISSIONS_PORT {
            Self::Wrapper
        } else {
            Self::Starttls
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Starttls => "starttls",
            Self::Wrapper => "wrapper",
            Self::None => "none",
        }
    }
}

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpRelayConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub tls: SmtpTls,
    /// Envelope sender. `None` keeps the original sender.
    pub envelope_from: Option<String>,
}

pub struct SmtpForward {
    transport: SmtpTransport,
    envelope_from: Option<String>,
}

impl SmtpForward {
    pub fn new(config: &SmtpRelayConfig) -> Result<Self, DeliveryError> {
        let builder = match config.tls {
            SmtpTls::Starttls => SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?,
            SmtpTls::Wrapper => SmtpTransport::relay(&config.host)
                .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?,
            SmtpTls::None => SmtpTransport::builder_dangerous(&config.host),
        };

        let builder = builder.port(config.port);
        let builder = if config.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            ))
        };

        tracing::debug!(
            host = %config.host,
            port = config.port,
            tls = config.tls.label(),
            "SMTP relay configured"
        );
        Ok(Self {
            transport: builder.build(),
            envelope_from: config.envelope_from.clone(),
        })
    }

    /// Envelope for relaying `message` to `target`.
    ///
    /// An empty original sender (a bounce) becomes a null reverse-path.
    pub fn envelope(
        &self,
        message: &InboundMessage,
        target: &Address,
    ) -> Result<Envelope, DeliveryError> {
        let sender = self
            .envelope_from
            .as_deref()
            .unwrap_or(message.from.as_str())
            .trim();
        let from = if sender.is_empty() {
            None
        } else {
            Some(parse_address(sender)?)
        };
        let to = parse_address(target.as_str())?;

        Envelope::new(from, vec![to])
            .map_err(|e| DeliveryError::Build(format!("Invalid envelope: {e}")))
    }
}

fn parse_address(raw: &str) -> Result<lettre::Address, DeliveryError> {
    raw.parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl ForwardAction for SmtpForward {
    fn name(&self) -> &str {
        "native"
    }

    async fn deliver(
        &self,
        message: &InboundMessage,
        target: &Address,
    ) -> Result<(), DeliveryError> {
        let envelope = self.envelope(message, target)?;
        let raw = message.raw();
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send_raw(&envelope, raw.as_bytes()))
            .await
            .map_err(|e| DeliveryError::Transport(format!("SMTP task failed: {e}")))?
            .map_err(|e| DeliveryError::Transport(format!("SMTP send failed: {e}")))?;

        tracing::debug!(forward_to = %target, "Relayed original message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpRelayConfig {
        SmtpRelayConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: SecretString::from(""),
            tls: SmtpTls::None,
            envelope_from: None,
        }
    }

    #[test]
    fn tls_mode_follows_port() {
        assert_eq!(SmtpTls::for_port(465), SmtpTls::Wrapper);
        assert_eq!(SmtpTls::for_port(587), SmtpTls::Starttls);
        assert_eq!(SmtpTls::for_port(25), SmtpTls::Starttls);
    }

    #[test]
    fn every_tls_mode_builds_a_transport() {
        for tls in [SmtpTls::Starttls, SmtpTls::Wrapper, SmtpTls::None] {
            let mut cfg = config();
            cfg.host = "smtp.example.com".into();
            cfg.tls = tls;
            assert!(SmtpForward::new(&cfg).is_ok(), "{}", tls.label());
        }
    }

    fn target(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn envelope_keeps_original_sender() {
        let forward = SmtpForward::new(&config()).unwrap();
        let msg = InboundMessage::new("alice@example.com", "Subject: hi\r\n\r\nbody");
        let envelope = forward.envelope(&msg, &target("team@new.com")).unwrap();
        assert_eq!(
            envelope.from().map(|a| a.to_string()).as_deref(),
            Some("alice@example.com")
        );
        assert_eq!(envelope.to().len(), 1);
        assert_eq!(envelope.to()[0].to_string(), "team@new.com");
    }

    #[test]
    fn envelope_uses_configured_sender() {
        let mut cfg = config();
        cfg.envelope_from = Some("relay@router.example".into());
        let forward = SmtpForward::new(&cfg).unwrap();
        let msg = InboundMessage::new("alice@example.com", "");
        let envelope = forward.envelope(&msg, &target("team@new.com")).unwrap();
        assert_eq!(
            envelope.from().map(|a| a.to_string()).as_deref(),
            Some("relay@router.example")
        );
    }

    #[test]
    fn empty_sender_is_null_reverse_path() {
        let forward = SmtpForward::new(&config()).unwrap();
        let msg = InboundMessage::new("", "");
        let envelope = forward.envelope(&msg, &target("team@new.com")).unwrap();
        assert!(envelope.from().is_none());
    }

    #[test]
    fn invalid_target_is_a_delivery_error() {
        let forward = SmtpForward::new(&config()).unwrap();
        let msg = InboundMessage::new("alice@example.com", "");
        let result = forward.envelope(&msg, &target("not-an-address"));
        assert!(matches!(result, Err(DeliveryError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn unreachable_relay_fails_without_panicking() {
        let mut cfg = config();
        cfg.host = "127.0.0.1".into();
        cfg.port = 1;
        let forward = SmtpForward::new(&cfg).unwrap();
        let msg = InboundMessage::new("alice@example.com", "Subject: hi\r\n\r\nbody");
        let result = forward.deliver(&msg, &target("team@new.com")).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
    }
}
