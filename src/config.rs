//! Configuration types, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::address::Address;
use crate::error::ConfigError;
use crate::forward::resend::{DEFAULT_API_URL, DEFAULT_FROM_NAME};
use crate::forward::{ResendConfig, SmtpRelayConfig, SmtpTls};

/// Variable holding inline rule JSON for the `env` rule source.
pub const RULES_VAR: &str = "MAILROUTE_RULES";

const DEFAULT_DB_PATH: &str = "./data/mailroute.db";
const DEFAULT_RULES_KEY: &str = "rules";
const DEFAULT_FROM_ADDRESS: &str = "noreply@forward.localhost";

/// Full router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Fallback mailbox. `None` means unmatched mail is dropped.
    pub default_target: Option<Address>,
    pub rules: RuleSourceConfig,
    pub forward: ForwardConfig,
    /// How the default target is reached.
    pub fallback: FallbackConfig,
    pub server: ServerConfig,
}

/// Where rules are read from on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSourceConfig {
    /// JSON in an environment variable.
    Env { var: String },
    /// JSON stored under `key` in a libSQL key-value table.
    LibSql { path: PathBuf, key: String },
}

/// Which forward profile delivers messages.
#[derive(Debug, Clone)]
pub enum ForwardConfig {
    Native(SmtpRelayConfig),
    Resend(ResendConfig),
}

impl ForwardConfig {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Resend(_) => "resend",
        }
    }
}

/// Delivery path for default-target forwards.
#[derive(Debug, Clone)]
pub enum FallbackConfig {
    /// Same forward profile as rule matches.
    Same,
    /// Relay the untouched message over SMTP, whatever the rule profile.
    Native(SmtpRelayConfig),
}

impl FallbackConfig {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Native(_) => "native",
        }
    }
}

/// Webhook server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound on one routing invocation.
    pub route_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            route_timeout: Duration::from_secs(30),
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let default_target = get("MAILROUTE_DEFAULT_TARGET").and_then(|v| Address::parse(&v));

        let rules = match get("MAILROUTE_RULES_SOURCE").as_deref() {
            None | Some("env") => RuleSourceConfig::Env {
                var: RULES_VAR.to_string(),
            },
            Some("libsql") => RuleSourceConfig::LibSql {
                path: PathBuf::from(
                    get("MAILROUTE_RULES_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
                ),
                key: get("MAILROUTE_RULES_KEY").unwrap_or_else(|| DEFAULT_RULES_KEY.to_string()),
            },
            Some(other) => {
                return Err(invalid("MAILROUTE_RULES_SOURCE", format!("unknown source '{other}'")));
            }
        };

        let forward = match get("MAILROUTE_FORWARD_MODE").as_deref() {
            None | Some("native") => ForwardConfig::Native(smtp_relay(&get)?),
            Some("resend") => {
                let api_key = get("RESEND_API_KEY")
                    .ok_or_else(|| ConfigError::MissingEnvVar("RESEND_API_KEY".into()))?;
                ForwardConfig::Resend(ResendConfig {
                    api_url: get("RESEND_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                    api_key: SecretString::from(api_key),
                    from_name: get("FORWARD_FROM_NAME")
                        .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
                    from_address: get("FORWARD_FROM_ADDRESS")
                        .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
                })
            }
            Some(other) => {
                return Err(invalid("MAILROUTE_FORWARD_MODE", format!("unknown mode '{other}'")));
            }
        };

        let fallback = match get("MAILROUTE_FALLBACK_MODE").as_deref() {
            None | Some("same") => FallbackConfig::Same,
            // A native profile already relays the default target natively.
            Some("native") if matches!(forward, ForwardConfig::Native(_)) => FallbackConfig::Same,
            Some("native") => FallbackConfig::Native(smtp_relay(&get)?),
            Some(other) => {
                return Err(invalid("MAILROUTE_FALLBACK_MODE", format!("unknown mode '{other}'")));
            }
        };

        let defaults = ServerConfig::default();
        let timeout_secs: u64 = parse_or(
            &get,
            "MAILROUTE_TIMEOUT_SECS",
            defaults.route_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(invalid("MAILROUTE_TIMEOUT_SECS", "must be at least 1"));
        }
        let server = ServerConfig {
            port: parse_or(&get, "MAILROUTE_PORT", defaults.port)?,
            route_timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            default_target,
            rules,
            forward,
            fallback,
            server,
        })
    }
}

/// SMTP relay settings. Without an explicit TLS mode, 465 gets implicit
/// TLS and every other port gets STARTTLS.
fn smtp_relay<G>(get: &G) -> Result<SmtpRelayConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let host = get("MAILROUTE_SMTP_HOST")
        .ok_or_else(|| ConfigError::MissingEnvVar("MAILROUTE_SMTP_HOST".into()))?;
    let port = parse_or(get, "MAILROUTE_SMTP_PORT", 587)?;
    let tls = match get("MAILROUTE_SMTP_TLS").map(|v| v.to_lowercase()).as_deref() {
        None | Some("auto") | Some("true") => SmtpTls::for_port(port),
        Some("starttls") => SmtpTls::Starttls,
        Some("wrapper") | Some("tls") => SmtpTls::Wrapper,
        Some("none") | Some("false") => SmtpTls::None,
        Some(other) => {
            return Err(invalid("MAILROUTE_SMTP_TLS", format!("unknown TLS mode '{other}'")));
        }
    };

    Ok(SmtpRelayConfig {
        host,
        port,
        username: get("MAILROUTE_SMTP_USERNAME").unwrap_or_default(),
        password: SecretString::from(get("MAILROUTE_SMTP_PASSWORD").unwrap_or_default()),
        tls,
        envelope_from: get("MAILROUTE_ENVELOPE_FROM"),
    })
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
