//! Rule sources and the per-invocation rule loader.

use std::fmt;

use async_trait::async_trait;

use crate::error::{RuleParseError, RuleSourceError};
use crate::observe::RouteObserver;
use crate::rules::RuleSet;

/// Where serialized rules come from (key/value store, environment, inline config).
///
/// `fetch` returns the raw JSON text, or `None` when nothing is configured.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Short name for logs ("env", "libsql", "static").
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Option<String>, RuleSourceError>;
}

/// Why no rule set is available for an invocation.
#[derive(Debug)]
pub enum RulesUnavailable {
    /// The source holds no rules.
    NotConfigured,
    /// The source could not be read.
    SourceFailed(RuleSourceError),
    /// The content is present but is not a valid rule list.
    Invalid(RuleParseError),
}

impl fmt::Display for RulesUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("no rules configured"),
            Self::SourceFailed(e) => write!(f, "rule source failed: {e}"),
            Self::Invalid(e) => write!(f, "invalid rules: {e}"),
        }
    }
}

/// Fetch and compile rules once. No retry.
///
/// Every failure is reported to `observer` and returned as
/// `RulesUnavailable`; it never propagates past the router.
pub async fn load_rules(
    source: &dyn RuleSource,
    observer: &dyn RouteObserver,
) -> Result<RuleSet, RulesUnavailable> {
    let result = match source.fetch().await {
        Ok(Some(raw)) if !raw.is_empty() => {
            RuleSet::from_json(&raw).map_err(RulesUnavailable::Invalid)
        }
        Ok(_) => Err(RulesUnavailable::NotConfigured),
        Err(e) => Err(RulesUnavailable::SourceFailed(e)),
    };

    match result {
        Ok(rules) => {
            tracing::debug!(source = source.name(), count = rules.len(), "Rules loaded");
            Ok(rules)
        }
        Err(reason) => {
            observer.rules_unavailable(&reason);
            Err(reason)
        }
    }
}

/// Rules read from an environment variable on every fetch.
#[derive(Debug, Clone)]
pub struct EnvRuleSource {
    var: String,
}

impl EnvRuleSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl RuleSource for EnvRuleSource {
    fn name(&self) -> &str {
        "env"
    }

    async fn fetch(&self) -> Result<Option<String>, RuleSourceError> {
        Ok(std::env::var(&self.var).ok())
    }
}

/// Rules fixed at construction (inline deployment configuration).
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    raw: Option<String>,
}

impl StaticRuleSource {
    pub fn new(raw: Option<String>) -> Self {
        Self { raw }
    }

    pub fn json(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    pub fn empty() -> Self {
        Self { raw: None }
    }
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Option<String>, RuleSourceError> {
        Ok(self.raw.clone())
    }
}
