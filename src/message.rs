//! Inbound message as seen by the router.
//!
//! Transport adapters (the webhook in `server.rs`, tests) build an
//! `InboundMessage`; the router and forward actions only read it.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use mail_parser::MessageParser;

/// The raw RFC 822 bytes of a message.
///
/// Read once from the transport into a shared immutable buffer, so every
/// forward gets its own handle and no consumer can drain it for another.
#[derive(Debug, Clone)]
pub struct RawMessage(Arc<[u8]>);

impl RawMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for RawMessage {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        Self::from(text.as_bytes())
    }
}

/// Message headers with case-insensitive lookup. First occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the header block of a raw message.
    ///
    /// Values are unfolded onto one line. `Subject` is stored decoded so
    /// encoded-word subjects read naturally in forwarded mail.
    pub fn from_raw(raw: &[u8]) -> Self {
        let mut headers = Self::new();
        let Some(parsed) = MessageParser::default().parse_headers(raw) else {
            return headers;
        };

        for header in parsed.headers() {
            let name = header.name.as_str();
            let value = if name.eq_ignore_ascii_case("subject") {
                parsed.subject().map(str::to_string)
            } else {
                raw.get(header.offset_start as usize..header.offset_end as usize)
                    .map(|bytes| unfold(&String::from_utf8_lossy(bytes)))
            };
            if let Some(value) = value {
                headers.insert(name, value);
            }
        }
        headers
    }
}

fn unfold(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// An inbound message: envelope fields, headers and raw content.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: String,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub headers: Headers,
    raw: RawMessage,
}

impl InboundMessage {
    /// Build a message, reading headers from the raw content.
    pub fn new(from: impl Into<String>, raw: impl Into<RawMessage>) -> Self {
        let raw = raw.into();
        Self {
            from: from.into(),
            to: None,
            cc: None,
            bcc: None,
            headers: Headers::from_raw(raw.as_bytes()),
            raw,
        }
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// A shared handle to the raw content. Cloning never copies the bytes.
    pub fn raw(&self) -> RawMessage {
        self.raw.clone()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.header("subject")
    }
}

/// Addresses from a parsed address header, comma-joined like an envelope field.
pub fn join_addresses(addr: Option<&mail_parser::Address>) -> Option<String> {
    let addr = addr?;
    let list: Vec<String> = match addr {
        mail_parser::Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    };
    if list.is_empty() {
        None
    } else {
        Some(list.join(", "))
    }
}
