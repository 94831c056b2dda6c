//! One routing invocation: recipients → rules → forwards → fallback.

pub mod dispatch;
pub mod fallback;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::address::{Address, RecipientSet, extract_recipients};
use crate::config::{FallbackConfig, ForwardConfig, RouterConfig, RuleSourceConfig};
use crate::forward::{ForwardAction, ForwardReason, ResendForward, SmtpForward};
use crate::message::InboundMessage;
use crate::observe::{RouteObserver, TracingObserver};
use crate::rules::{EnvRuleSource, LibSqlRuleSource, RuleSource, load_rules};

pub use dispatch::{Dispatched, dispatch, plan};
pub use fallback::{Fallback, fallback_reason, select_fallback};

/// Outcome of one forward.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardAttempt {
    pub target: Address,
    pub reason: ForwardReason,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one invocation did, for logs and the webhook response.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub invocation_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub recipients: RecipientSet,
    /// Whether a usable rule set was loaded.
    pub rules_available: bool,
    pub forwards: Vec<ForwardAttempt>,
    /// No rule matched and there was no default target.
    pub dropped: bool,
}

impl RouteReport {
    pub fn delivered_targets(&self) -> Vec<&Address> {
        self.forwards
            .iter()
            .filter(|f| f.delivered)
            .map(|f| &f.target)
            .collect()
    }
}

/// Deliver to one target and report the outcome. Never fails.
pub(crate) async fn deliver_one(
    message: &InboundMessage,
    target: &Address,
    reason: ForwardReason,
    action: &dyn ForwardAction,
    observer: &dyn RouteObserver,
) -> ForwardAttempt {
    match action.deliver(message, target).await {
        Ok(()) => {
            observer.forwarded(target, reason);
            ForwardAttempt {
                target: target.clone(),
                reason,
                delivered: true,
                error: None,
            }
        }
        Err(e) => {
            observer.delivery_failed(target, reason, &e);
            ForwardAttempt {
                target: target.clone(),
                reason,
                delivered: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Routes inbound messages. Shared across concurrent invocations; holds
/// no per-message state.
#[derive(Clone)]
pub struct Router {
    rules: Arc<dyn RuleSource>,
    action: Arc<dyn ForwardAction>,
    /// Delivers default-target forwards. `None` reuses `action`.
    fallback_action: Option<Arc<dyn ForwardAction>>,
    observer: Arc<dyn RouteObserver>,
    default_target: Option<Address>,
}

impl Router {
    pub fn new(rules: Arc<dyn RuleSource>, action: Arc<dyn ForwardAction>) -> Self {
        Self {
            rules,
            action,
            fallback_action: None,
            observer: Arc::new(TracingObserver),
            default_target: None,
        }
    }

    /// Wire the configured rule source and forward profile.
    pub async fn from_config(config: &RouterConfig) -> crate::Result<Self> {
        let rules: Arc<dyn RuleSource> = match &config.rules {
            RuleSourceConfig::Env { var } => Arc::new(EnvRuleSource::new(var.clone())),
            RuleSourceConfig::LibSql { path, key } => {
                Arc::new(LibSqlRuleSource::new_local(path, key.clone()).await?)
            }
        };

        let action: Arc<dyn ForwardAction> = match &config.forward {
            ForwardConfig::Native(smtp) => Arc::new(SmtpForward::new(smtp)?),
            ForwardConfig::Resend(resend) => Arc::new(ResendForward::new(resend.clone())),
        };

        let router = Self::new(rules, action).with_default_target(config.default_target.clone());
        let router = match &config.fallback {
            FallbackConfig::Same => router,
            FallbackConfig::Native(smtp) => {
                router.with_fallback_action(Arc::new(SmtpForward::new(smtp)?))
            }
        };

        tracing::info!(
            rules = router.rules.name(),
            forward = router.action.name(),
            fallback = router.fallback_action().name(),
            "Router configured"
        );
        Ok(router)
    }

    /// Send default-target forwards through a different profile, e.g. a
    /// native relay while rule matches are re-sent through an API.
    pub fn with_fallback_action(mut self, action: Arc<dyn ForwardAction>) -> Self {
        self.fallback_action = Some(action);
        self
    }

    fn fallback_action(&self) -> &dyn ForwardAction {
        self.fallback_action.as_deref().unwrap_or(self.action.as_ref())
    }

    pub fn with_default_target(mut self, target: Option<Address>) -> Self {
        self.default_target = target;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RouteObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn default_target(&self) -> Option<&Address> {
        self.default_target.as_ref()
    }

    /// Route one message. Rule and delivery failures are absorbed and
    /// reported; this always completes with a report.
    pub async fn route(&self, message: &InboundMessage) -> RouteReport {
        let invocation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "route",
            invocation = %invocation_id,
            from = %message.from,
            forward = self.action.name(),
        );

        self.route_inner(invocation_id, message).instrument(span).await
    }

    async fn route_inner(&self, invocation_id: Uuid, message: &InboundMessage) -> RouteReport {
        let received_at = Utc::now();
        let recipients = extract_recipients(
            message.to.as_deref(),
            message.cc.as_deref(),
            message.bcc.as_deref(),
        );
        tracing::debug!(count = recipients.len(), "Recipients extracted");

        let observer = self.observer.as_ref();
        let action = self.action.as_ref();
        let loaded = load_rules(self.rules.as_ref(), observer).await;

        let Dispatched {
            targets,
            mut attempts,
        } = match &loaded {
            Ok(rules) => dispatch(message, &recipients, rules, action, observer).await,
            Err(_) => Dispatched::default(),
        };

        let outcome = select_fallback(
            message,
            &targets,
            self.default_target.as_ref(),
            fallback_reason(&loaded),
            self.fallback_action(),
            observer,
        )
        .await;

        let dropped = match outcome {
            Fallback::Forwarded(attempt) => {
                attempts.push(attempt);
                false
            }
            Fallback::Dropped => true,
            Fallback::NotNeeded => false,
        };

        RouteReport {
            invocation_id,
            received_at,
            recipients,
            rules_available: loaded.is_ok(),
            forwards: attempts,
            dropped,
        }
    }
}
