//! Forward actions: deliver a copy of the inbound message to one target.
//!
//! Two interchangeable profiles:
//! - `SmtpForward` relays the untouched message (native forward)
//! - `ResendForward` re-sends it through a transactional-email API with the
//!   original attached as `message/rfc822`

pub mod native;
pub mod resend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::DeliveryError;
use crate::message::InboundMessage;

pub use native::{SmtpForward, SmtpRelayConfig, SmtpTls};
pub use resend::{ResendConfig, ResendForward};

/// Why a forward happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardReason {
    /// No rules configured; default target used.
    DefaultNoRules,
    /// Rules present but unreadable or unparsable; default target used.
    InvalidRuleSource,
    /// Rules loaded but none matched; default target used.
    NoMatchingRule,
    /// A rule matched a recipient.
    RuleMatch,
}

impl ForwardReason {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DefaultNoRules => "default_no_rules",
            Self::InvalidRuleSource => "invalid_rule_source",
            Self::NoMatchingRule => "no_matching_rule",
            Self::RuleMatch => "rule_match",
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::RuleMatch)
    }
}

/// Deliver one copy of a message to one target.
///
/// Implementations must not mutate the message; they read the raw content
/// through `InboundMessage::raw`, which hands out independent handles.
#[async_trait]
pub trait ForwardAction: Send + Sync {
    /// Profile name for logs ("native", "resend").
    fn name(&self) -> &str;

    async fn deliver(&self, message: &InboundMessage, target: &Address)
    -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rule_match_is_not_fallback() {
        assert!(!ForwardReason::RuleMatch.is_fallback());
        assert!(ForwardReason::DefaultNoRules.is_fallback());
        assert!(ForwardReason::InvalidRuleSource.is_fallback());
        assert!(ForwardReason::NoMatchingRule.is_fallback());
    }

    #[test]
    fn reason_serializes_as_label() {
        for reason in [
            ForwardReason::DefaultNoRules,
            ForwardReason::InvalidRuleSource,
            ForwardReason::NoMatchingRule,
            ForwardReason::RuleMatch,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.label()));
        }
    }
}
