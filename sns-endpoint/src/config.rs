//! Configuration module for environment variable parsing.
//!
//! `Config` holds the raw settings read from the environment. The dispatch
//! endpoint consumes `EndpointConfig`, the validated form with its domain
//! patterns compiled.

use std::env;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::cert::DEFAULT_CACHE_CAPACITY;
use crate::payload::MessageType;

/// Host pattern SNS uses for certificates and subscribe URLs.
pub const DEFAULT_DOMAIN_PATTERN: &str = r"^sns\.[a-z0-9-]+\.amazonaws\.com$";

/// Header SNS sets to the topic ARN of each delivery.
pub const DEFAULT_TOPIC_HEADER: &str = "x-amz-sns-topic-arn";

/// Errors in configuration values that cannot fall back to a default.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} pattern: {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Route the SNS subscription points at
    pub endpoint_path: String,

    /// Optional list of topic ARNs accepted by the endpoint
    pub topic_allowlist: Option<Vec<String>>,

    /// Header carrying the topic ARN
    pub topic_header: String,

    /// Regex the `SigningCertURL` host must match
    pub cert_domain_pattern: String,

    /// Regex the `SubscribeURL` host must match
    pub subscribe_domain_pattern: String,

    /// Whether message signatures are checked
    pub verify_signature: bool,

    /// Only confirm subscriptions from topics owned by this AWS account
    pub account_restriction: Option<String>,

    /// Message types accepted; all three when unset
    pub allowed_message_types: Option<Vec<MessageType>>,

    /// Timeout for outbound GETs in milliseconds
    pub request_timeout_ms: u64,

    /// Number of signing certificates kept in memory
    pub cert_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            endpoint_path: "/sns".to_string(),
            topic_allowlist: None,
            topic_header: DEFAULT_TOPIC_HEADER.to_string(),
            cert_domain_pattern: DEFAULT_DOMAIN_PATTERN.to_string(),
            subscribe_domain_pattern: DEFAULT_DOMAIN_PATTERN.to_string(),
            verify_signature: true,
            account_restriction: None,
            allowed_message_types: None,
            request_timeout_ms: 5000,
            cert_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_number("PORT", defaults.port),

            endpoint_path: env::var("SNS_ENDPOINT_PATH").unwrap_or(defaults.endpoint_path),

            topic_allowlist: parse_csv("SNS_TOPIC_ALLOWLIST"),

            topic_header: env::var("SNS_TOPIC_HEADER").unwrap_or(defaults.topic_header),

            cert_domain_pattern: env::var("SNS_CERT_DOMAIN_REGEX")
                .unwrap_or(defaults.cert_domain_pattern),

            subscribe_domain_pattern: env::var("SNS_SUBSCRIBE_DOMAIN_REGEX")
                .unwrap_or(defaults.subscribe_domain_pattern),

            verify_signature: parse_bool("SNS_VERIFY_CERTIFICATE", defaults.verify_signature),

            account_restriction: env::var("AWS_ACCOUNT_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            allowed_message_types: parse_message_types("SNS_ALLOWED_MESSAGE_TYPES"),

            request_timeout_ms: parse_number("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),

            cert_cache_capacity: parse_number("PEM_CACHE_CAPACITY", defaults.cert_cache_capacity),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate and compile the settings the dispatch endpoint needs.
    pub fn endpoint_config(&self) -> Result<EndpointConfig, ConfigError> {
        Ok(EndpointConfig {
            topic_allowlist: self.topic_allowlist.clone(),
            topic_header: self.topic_header.clone(),
            cert_domain: compile("certificate domain", &self.cert_domain_pattern)?,
            subscribe_domain: compile("subscribe domain", &self.subscribe_domain_pattern)?,
            verify_signature: self.verify_signature,
            account_restriction: self.account_restriction.clone(),
            allowed_message_types: self.allowed_message_types.clone(),
        })
    }
}

/// Settings consumed by the dispatch endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// When set, deliveries must carry one of these topic ARNs
    pub topic_allowlist: Option<Vec<String>>,
    pub topic_header: String,
    pub cert_domain: Regex,
    pub subscribe_domain: Regex,
    pub verify_signature: bool,
    pub account_restriction: Option<String>,
    pub allowed_message_types: Option<Vec<MessageType>>,
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern { name, source })
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}

/// Parse a boolean flag such as "true", "0" or "no".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Parse a comma-separated list of message types, skipping unknown names.
fn parse_message_types(name: &str) -> Option<Vec<MessageType>> {
    let types = parse_csv(name)?
        .into_iter()
        .filter_map(|raw| match raw.parse() {
            Ok(message_type) => Some(message_type),
            Err(_) => {
                warn!(env_var = name, value = %raw, "Unknown message type, ignoring");
                None
            }
        })
        .collect();
    Some(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_valid() {
        env::set_var("TEST_SNS_NUMBER", "4242");
        assert_eq!(parse_number("TEST_SNS_NUMBER", 0u16), 4242);
        env::remove_var("TEST_SNS_NUMBER");
    }

    #[test]
    fn test_parse_number_invalid_uses_default() {
        env::set_var("TEST_SNS_NUMBER_BAD", "lots");
        assert_eq!(parse_number("TEST_SNS_NUMBER_BAD", 64usize), 64);
        env::remove_var("TEST_SNS_NUMBER_BAD");
    }

    #[test]
    fn test_parse_bool() {
        env::set_var("TEST_SNS_BOOL", "False");
        assert!(!parse_bool("TEST_SNS_BOOL", true));
        env::set_var("TEST_SNS_BOOL", "1");
        assert!(parse_bool("TEST_SNS_BOOL", false));
        env::set_var("TEST_SNS_BOOL", "maybe");
        assert!(parse_bool("TEST_SNS_BOOL", true));
        env::remove_var("TEST_SNS_BOOL");

        assert!(parse_bool("NONEXISTENT_SNS_BOOL", true));
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_SNS_CSV", "arn:aws:sns:us-west-2:1:A, arn:aws:sns:us-west-2:1:B,");
        let result = parse_csv("TEST_SNS_CSV");
        assert_eq!(
            result,
            Some(vec![
                "arn:aws:sns:us-west-2:1:A".to_string(),
                "arn:aws:sns:us-west-2:1:B".to_string()
            ])
        );
        env::remove_var("TEST_SNS_CSV");
    }

    #[test]
    fn test_parse_message_types() {
        env::set_var(
            "TEST_SNS_MESSAGE_TYPES",
            "Notification, Bogus,UnsubscribeConfirmation",
        );
        assert_eq!(
            parse_message_types("TEST_SNS_MESSAGE_TYPES"),
            Some(vec![
                MessageType::Notification,
                MessageType::UnsubscribeConfirmation
            ])
        );
        env::remove_var("TEST_SNS_MESSAGE_TYPES");

        assert_eq!(parse_message_types("NONEXISTENT_SNS_MESSAGE_TYPES"), None);
    }

    #[test]
    fn test_default_endpoint_config() {
        let config = Config::default().endpoint_config().unwrap();

        assert!(config.verify_signature);
        assert!(config.topic_allowlist.is_none());
        assert!(config.account_restriction.is_none());
        assert!(config.cert_domain.is_match("sns.us-west-2.amazonaws.com"));
        assert!(config.cert_domain.is_match("sns.ap-southeast-2.amazonaws.com"));
        assert!(!config.cert_domain.is_match("baddomain.com"));
        assert!(!config.subscribe_domain.is_match("anon.amazonaws.com"));
        assert!(config.allowed_message_types.is_none());
    }

    #[test]
    fn test_default_domain_rejects_look_alike_hosts() {
        let config = Config::default().endpoint_config().unwrap();

        for host in [
            "snsxaxamazonaws.com",
            "sns.us-west-2xamazonaws.com",
            "evilsns.us-west-2.amazonaws.com",
            "sns.us-west-2.amazonaws.com.evil.com",
            "sns.us-west-2.amazonawsxcom",
        ] {
            assert!(!config.cert_domain.is_match(host), "{host}");
            assert!(!config.subscribe_domain.is_match(host), "{host}");
        }
        assert!(config.cert_domain.is_match("sns.cn-north-1.amazonaws.com"));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let config = Config {
            cert_domain_pattern: "sns.(".to_string(),
            ..Config::default()
        };

        let err = config.endpoint_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPattern {
                name: "certificate domain",
                ..
            }
        ));
    }
}
