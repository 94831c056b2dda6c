//! Forwarding rules: wildcard pattern → target mailbox.

pub mod libsql_store;
pub mod pattern;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::RuleParseError;

pub use libsql_store::LibSqlRuleSource;
pub use pattern::{Matcher, compile};
pub use store::{EnvRuleSource, RuleSource, StaticRuleSource, load_rules};

/// Wire form of one rule, as stored in the rule source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub pattern: String,
    pub target: String,
}

/// A compiled forwarding rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub target: Address,
    matcher: Matcher,
}

impl Rule {
    pub fn new(pattern: &str, target: Address) -> Result<Self, regex::Error> {
        Ok(Self {
            target,
            matcher: compile(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn matches(&self, address: &Address) -> bool {
        self.matcher.is_match(address)
    }
}

/// Ordered rules for one invocation. Order decides which rule claims a
/// shared target first.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Parse a JSON array of `{pattern, target}` objects.
    ///
    /// All or nothing: one bad entry rejects the whole list.
    pub fn from_json(json: &str) -> Result<Self, RuleParseError> {
        let definitions: Vec<RuleDefinition> = serde_json::from_str(json)?;
        Self::from_definitions(&definitions)
    }

    pub fn from_definitions(definitions: &[RuleDefinition]) -> Result<Self, RuleParseError> {
        let rules = definitions
            .iter()
            .enumerate()
            .map(|(index, def)| {
                let target =
                    Address::parse(&def.target).ok_or(RuleParseError::EmptyTarget { index })?;
                Rule::new(&def.pattern, target)
                    .map_err(|source| RuleParseError::Pattern { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}
