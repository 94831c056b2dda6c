//! Default-target forwarding when no rule produced a target.

use crate::address::{Address, TargetSet};
use crate::forward::{ForwardAction, ForwardReason};
use crate::message::InboundMessage;
use crate::observe::RouteObserver;
use crate::router::{ForwardAttempt, deliver_one};
use crate::rules::RuleSet;
use crate::rules::store::RulesUnavailable;

/// Reason recorded on a fallback forward, given how rule loading went.
pub fn fallback_reason(rules: &Result<RuleSet, RulesUnavailable>) -> ForwardReason {
    match rules {
        Ok(_) => ForwardReason::NoMatchingRule,
        Err(RulesUnavailable::NotConfigured) => ForwardReason::DefaultNoRules,
        Err(RulesUnavailable::SourceFailed(_) | RulesUnavailable::Invalid(_)) => {
            ForwardReason::InvalidRuleSource
        }
    }
}

/// What the fallback step did.
#[derive(Debug)]
pub enum Fallback {
    /// Rules already claimed at least one target.
    NotNeeded,
    /// Forwarded (or tried to) to the default target.
    Forwarded(ForwardAttempt),
    /// No target claimed and no default configured.
    Dropped,
}

/// Forward to `default_target` exactly once when `forwarded` is empty.
pub async fn select_fallback(
    message: &InboundMessage,
    forwarded: &TargetSet,
    default_target: Option<&Address>,
    reason: ForwardReason,
    action: &dyn ForwardAction,
    observer: &dyn RouteObserver,
) -> Fallback {
    if !forwarded.is_empty() {
        return Fallback::NotNeeded;
    }

    match default_target {
        Some(target) => {
            Fallback::Forwarded(deliver_one(message, target, reason, action, observer).await)
        }
        None => {
            observer.dropped();
            Fallback::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RuleParseError, RuleSourceError};
    use crate::observe::{ObservedEvent, RecordingObserver};
    use crate::router::testing::{FlakyForward, RecordingForward};

    fn message() -> InboundMessage {
        InboundMessage::new("sender@outside.com", "Subject: hi\r\n\r\nbody")
    }

    fn ops() -> Address {
        Address::parse("ops@company.com").unwrap()
    }

    #[test]
    fn reason_tracks_rule_outcome() {
        assert_eq!(
            fallback_reason(&Ok(RuleSet::new(Vec::new()))),
            ForwardReason::NoMatchingRule
        );
        assert_eq!(
            fallback_reason(&Err(RulesUnavailable::NotConfigured)),
            ForwardReason::DefaultNoRules
        );
        assert_eq!(
            fallback_reason(&Err(RulesUnavailable::SourceFailed(RuleSourceError::Query(
                "gone".into()
            )))),
            ForwardReason::InvalidRuleSource
        );
        assert_eq!(
            fallback_reason(&Err(RulesUnavailable::Invalid(RuleParseError::EmptyTarget {
                index: 0
            }))),
            ForwardReason::InvalidRuleSource
        );
    }

    #[tokio::test]
    async fn empty_set_forwards_once_to_default() {
        let action = RecordingForward::new();
        let observer = RecordingObserver::new();
        let target = ops();

        let outcome = select_fallback(
            &message(),
            &TargetSet::new(),
            Some(&target),
            ForwardReason::NoMatchingRule,
            &action,
            &observer,
        )
        .await;

        assert!(matches!(outcome, Fallback::Forwarded(ref a) if a.delivered));
        assert_eq!(action.delivered(), vec!["ops@company.com"]);
        assert_eq!(
            observer.events(),
            vec![ObservedEvent::Forwarded {
                target: "ops@company.com".into(),
                reason: ForwardReason::NoMatchingRule,
            }]
        );
    }

    #[tokio::test]
    async fn claimed_targets_skip_fallback() {
        let action = RecordingForward::new();
        let observer = RecordingObserver::new();
        let target = ops();
        let forwarded: TargetSet = [Address::parse("team@new.com").unwrap()].into_iter().collect();

        let outcome = select_fallback(
            &message(),
            &forwarded,
            Some(&target),
            ForwardReason::NoMatchingRule,
            &action,
            &observer,
        )
        .await;

        assert!(matches!(outcome, Fallback::NotNeeded));
        assert!(action.delivered().is_empty());
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn no_default_drops_message() {
        let action = RecordingForward::new();
        let observer = RecordingObserver::new();

        let outcome = select_fallback(
            &message(),
            &TargetSet::new(),
            None,
            ForwardReason::DefaultNoRules,
            &action,
            &observer,
        )
        .await;

        assert!(matches!(outcome, Fallback::Dropped));
        assert!(action.delivered().is_empty());
        assert_eq!(observer.events(), vec![ObservedEvent::Dropped]);
    }

    #[tokio::test]
    async fn failed_default_forward_is_reported() {
        let action = FlakyForward::failing_for(&["ops@company.com"]);
        let observer = RecordingObserver::new();
        let target = ops();

        let outcome = select_fallback(
            &message(),
            &TargetSet::new(),
            Some(&target),
            ForwardReason::InvalidRuleSource,
            &action,
            &observer,
        )
        .await;

        assert!(matches!(outcome, Fallback::Forwarded(ref a) if !a.delivered));
        assert_eq!(
            observer.events(),
            vec![ObservedEvent::DeliveryFailed {
                target: "ops@company.com".into(),
                reason: ForwardReason::InvalidRuleSource,
            }]
        );
    }
}
