//! Observability sink injected into the router.
//!
//! The routing core reports what happened through `RouteObserver` instead
//! of logging directly, so tests can assert on events without capturing
//! process output.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::address::Address;
use crate::error::DeliveryError;
use crate::forward::ForwardReason;
use crate::rules::store::RulesUnavailable;

pub trait RouteObserver: Send + Sync {
    /// Rules could not be used for this invocation.
    fn rules_unavailable(&self, reason: &RulesUnavailable);

    /// A forward to `target` succeeded.
    fn forwarded(&self, target: &Address, reason: ForwardReason);

    /// A forward to `target` failed. Processing continues.
    fn delivery_failed(&self, target: &Address, reason: ForwardReason, error: &DeliveryError);

    /// Nothing matched and no default target is configured.
    fn dropped(&self);
}

/// Production observer: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RouteObserver for TracingObserver {
    fn rules_unavailable(&self, reason: &RulesUnavailable) {
        match reason {
            RulesUnavailable::NotConfigured => info!("No forwarding rules configured"),
            other => warn!(reason = %other, "Forwarding rules unavailable, using fallback"),
        }
    }

    fn forwarded(&self, target: &Address, reason: ForwardReason) {
        info!(
            forward_to = %target,
            reason = reason.label(),
            fallback = reason.is_fallback(),
            "Message forwarded"
        );
    }

    fn delivery_failed(&self, target: &Address, reason: ForwardReason, error: &DeliveryError) {
        warn!(
            forward_to = %target,
            reason = reason.label(),
            fallback = reason.is_fallback(),
            error = %error,
            "Forward failed"
        );
    }

    fn dropped(&self) {
        info!("No rule matched and no default target configured; message dropped");
    }
}

/// One recorded observer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    RulesUnavailable(String),
    Forwarded { target: String, reason: ForwardReason },
    DeliveryFailed { target: String, reason: ForwardReason },
    Dropped,
}

/// In-memory observer that keeps every event, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: ObservedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl RouteObserver for RecordingObserver {
    fn rules_unavailable(&self, reason: &RulesUnavailable) {
        self.record(ObservedEvent::RulesUnavailable(reason.to_string()));
    }

    fn forwarded(&self, target: &Address, reason: ForwardReason) {
        self.record(ObservedEvent::Forwarded {
            target: target.to_string(),
            reason,
        });
    }

    fn delivery_failed(&self, target: &Address, reason: ForwardReason, _error: &DeliveryError) {
        self.record(ObservedEvent::DeliveryFailed {
            target: target.to_string(),
            reason,
        });
    }

    fn dropped(&self) {
        self.record(ObservedEvent::Dropped);
    }
}
