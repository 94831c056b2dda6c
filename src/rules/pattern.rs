//! Wildcard address patterns.
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one character, everything else matches itself. Patterns are anchored at
//! both ends, so `*@example.com` never matches `a@example.com.evil`.

use regex::Regex;

use crate::address::Address;

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    regex: Regex,
}

impl Matcher {
    /// The (lower-cased) wildcard source this matcher was built from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the whole address matches the pattern.
    pub fn is_match(&self, address: &Address) -> bool {
        self.regex.is_match(address.as_str())
    }
}

/// Translate a wildcard pattern into an anchored regex source.
pub fn to_regex_source(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() + 2);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => {
                let mut buf = [0u8; 4];
                source.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    source.push('$');
    source
}

/// Compile a wildcard pattern.
///
/// The pattern is lower-cased first so it lines up with normalized
/// addresses. Every string is a legal pattern; the only possible error is
/// the regex engine's size limit on pathologically long input.
pub fn compile(pattern: &str) -> Result<Matcher, regex::Error> {
    let pattern = pattern.to_lowercase();
    let regex = Regex::new(&to_regex_source(&pattern))?;
    Ok(Matcher { pattern, regex })
}
