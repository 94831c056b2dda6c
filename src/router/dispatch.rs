//! Match recipients against rules and forward once per distinct target.

use crate::address::{RecipientSet, TargetSet};
use crate::forward::{ForwardAction, ForwardReason};
use crate::message::InboundMessage;
use crate::observe::RouteObserver;
use crate::router::{ForwardAttempt, deliver_one};
use crate::rules::RuleSet;

/// Targets to forward to, in recipient-then-rule order.
///
/// A rule never consumes a recipient: every rule is tried for every
/// recipient. A target is claimed by the first match that reaches it;
/// later matches for the same target are skipped, whichever rule or
/// recipient they come from.
pub fn plan(recipients: &RecipientSet, rules: &RuleSet) -> TargetSet {
    let mut targets = TargetSet::new();
    for recipient in recipients {
        for rule in rules.iter() {
            if rule.matches(recipient) && targets.insert(rule.target.clone()) {
                tracing::debug!(
                    recipient = %recipient,
                    pattern = rule.pattern(),
                    forward_to = %rule.target,
                    "Rule matched"
                );
            }
        }
    }
    targets
}

/// Result of the rule-driven dispatch phase.
#[derive(Debug, Default)]
pub struct Dispatched {
    /// Every target claimed by a rule, delivered or not.
    pub targets: TargetSet,
    pub attempts: Vec<ForwardAttempt>,
}

/// Forward `message` to every planned target, one at a time.
///
/// Dedup is settled by `plan` before the first delivery starts. A failed
/// delivery is reported and the loop moves on to the next target.
pub async fn dispatch(
    message: &InboundMessage,
    recipients: &RecipientSet,
    rules: &RuleSet,
    action: &dyn ForwardAction,
    observer: &dyn RouteObserver,
) -> Dispatched {
    let targets = plan(recipients, rules);
    let mut attempts = Vec::with_capacity(targets.len());

    for target in &targets {
        let attempt = deliver_one(message, target, ForwardReason::RuleMatch, action, observer).await;
        attempts.push(attempt);
    }

    Dispatched { targets, attempts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, extract_recipients};
    use crate::observe::{ObservedEvent, RecordingObserver};
    use crate::router::testing::{FlakyForward, RecordingForward};

    fn rules(json: &str) -> RuleSet {
        RuleSet::from_json(json).unwrap()
    }

    fn old_new_rules() -> RuleSet {
        rules(
            r#"[{"pattern":"*@old.com","target":"team@new.com"},
                {"pattern":"ceo@old.com","target":"boss@new.com"}]"#,
        )
    }

    fn message() -> InboundMessage {
        InboundMessage::new("sender@outside.com", "Subject: hi\r\n\r\nbody")
    }

    fn names(set: &TargetSet) -> Vec<&str> {
        set.iter().map(Address::as_str).collect()
    }

    #[test]
    fn one_recipient_many_rules_gives_distinct_targets() {
        let recipients = extract_recipients(Some("ceo@old.com"), None, None);
        let targets = plan(&recipients, &old_new_rules());
        assert_eq!(names(&targets), vec!["team@new.com", "boss@new.com"]);
    }

    #[test]
    fn shared_target_is_planned_once_across_recipients() {
        let recipients = extract_recipients(Some("x@old.com, y@old.com"), None, None);
        let targets = plan(&recipients, &old_new_rules());
        assert_eq!(names(&targets), vec!["team@new.com"]);
    }

    #[test]
    fn no_match_plans_nothing() {
        let recipients = extract_recipients(Some("x@elsewhere.com"), None, None);
        assert!(plan(&recipients, &old_new_rules()).is_empty());
    }

    #[test]
    fn later_rule_cannot_refire_claimed_target() {
        let rules = rules(
            r#"[{"pattern":"a@x.com","target":"same@t.com"},
                {"pattern":"*@x.com","target":"same@t.com"},
                {"pattern":"*@x.com","target":"other@t.com"}]"#,
        );
        let recipients = extract_recipients(Some("a@x.com, b@x.com"), None, None);
        let targets = plan(&recipients, &rules);
        assert_eq!(names(&targets), vec!["same@t.com", "other@t.com"]);
    }

    #[test]
    fn order_follows_recipients_then_rules() {
        let rules = rules(
            r#"[{"pattern":"b@x.com","target":"for-b@t.com"},
                {"pattern":"a@x.com","target":"for-a@t.com"}]"#,
        );
        let recipients = extract_recipients(Some("a@x.com"), Some("b@x.com"), None);
        assert_eq!(names(&plan(&recipients, &rules)), vec!["for-a@t.com", "for-b@t.com"]);
    }

    #[tokio::test]
    async fn dispatch_forwards_each_target_once() {
        let action = RecordingForward::new();
        let observer = RecordingObserver::new();
        let recipients = extract_recipients(Some("x@old.com"), Some("ceo@old.com"), Some("y@old.com"));

        let dispatched = dispatch(&message(), &recipients, &old_new_rules(), &action, &observer).await;

        assert_eq!(action.delivered(), vec!["team@new.com", "boss@new.com"]);
        assert_eq!(dispatched.targets.len(), 2);
        assert!(dispatched.attempts.iter().all(|a| a.delivered));
        assert_eq!(observer.events().len(), 2);
    }

    #[tokio::test]
    async fn failed_target_does_not_block_the_next() {
        let action = FlakyForward::failing_for(&["team@new.com"]);
        let observer = RecordingObserver::new();
        let recipients = extract_recipients(Some("ceo@old.com"), None, None);

        let dispatched = dispatch(&message(), &recipients, &old_new_rules(), &action, &observer).await;

        assert_eq!(action.attempted(), vec!["team@new.com", "boss@new.com"]);
        assert!(!dispatched.attempts[0].delivered);
        assert!(dispatched.attempts[0].error.is_some());
        assert!(dispatched.attempts[1].delivered);
        assert_eq!(
            observer.events(),
            vec![
                ObservedEvent::DeliveryFailed {
                    target: "team@new.com".into(),
                    reason: ForwardReason::RuleMatch,
                },
                ObservedEvent::Forwarded {
                    target: "boss@new.com".into(),
                    reason: ForwardReason::RuleMatch,
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_delivery_still_claims_target() {
        let action = FlakyForward::failing_for(&["team@new.com"]);
        let observer = RecordingObserver::new();
        let recipients = extract_recipients(Some("x@old.com"), None, None);

        let dispatched = dispatch(&message(), &recipients, &old_new_rules(), &action, &observer).await;

        assert_eq!(dispatched.targets.len(), 1);
        assert!(!dispatched.attempts[0].delivered);
    }
}
