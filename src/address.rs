//! Mailbox addresses and the ordered address sets built from them.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// A case-insensitive mailbox address, stored trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Normalize a raw address. Returns `None` when nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An insertion-ordered set of addresses.
///
/// Iteration follows first insertion, so dispatch order (and therefore
/// which forward claims a target) is reproducible.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AddressSet {
    ordered: Vec<Address>,
    #[serde(skip)]
    seen: HashSet<Address>,
}

/// Recipients of one inbound message.
pub type RecipientSet = AddressSet;

/// Targets already forwarded to during one invocation.
pub type TargetSet = AddressSet;

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an address. Returns `false` if it was already present.
    pub fn insert(&mut self, address: Address) -> bool {
        if self.seen.contains(&address) {
            return false;
        }
        self.seen.insert(address.clone());
        self.ordered.push(address);
        true
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.seen.contains(address)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.ordered.iter()
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.ordered.iter()
    }
}

impl FromIterator<Address> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut set = Self::new();
        for address in iter {
            set.insert(address);
        }
        set
    }
}

/// Build the recipient set from the raw `to`, `cc` and `bcc` fields.
///
/// Each field is an optional comma-separated list. Entries are trimmed,
/// lower-cased and deduplicated; empty entries are dropped.
pub fn extract_recipients(to: Option<&str>, cc: Option<&str>, bcc: Option<&str>) -> RecipientSet {
    [to, cc, bcc]
        .into_iter()
        .flatten()
        .flat_map(|field| field.split(','))
        .filter_map(Address::parse)
        .collect()
}
