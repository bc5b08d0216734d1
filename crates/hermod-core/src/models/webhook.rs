//! Webhook subscriber domain model.
//!
//! Subscribers receive domain events via HTTP POST with per-subscriber
//! authentication, retry policy and optional HMAC payload signatures.

use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{HermodError, HermodResult};
use crate::events::EventKind;

/// A registered webhook subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSubscriber {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Subscribed event kinds; empty means all events.
    pub events: Vec<EventKind>,
    /// Extra static headers merged into every delivery.
    pub headers: HashMap<String, String>,
    pub authentication: WebhookAuth,
    pub retry_config: RetryConfig,
    pub security_config: SecurityConfig,
    pub filter_config: FilterConfig,
    /// Per-request timeout in milliseconds (1000–60000).
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    pub stats: WebhookStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authentication applied to outbound deliveries.
///
/// The discriminator determines which fields are required; enforcement
/// happens at deserialization time via the tagged representation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        token: String,
        header: String,
    },
    Jwt {
        secret: String,
    },
}

/// Retry policy for failed deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum delivery attempts (1–20).
    pub max_attempts: u32,
    /// Initial delay between attempts in seconds (1–300).
    pub initial_delay_seconds: u64,
    pub use_exponential_backoff: bool,
    /// Backoff ceiling in seconds (1–3600).
    pub max_delay_seconds: u64,
    /// Jitter as a fraction of the base delay (0–1).
    pub jitter_factor: f64,
    /// HTTP status codes that fail immediately without retry.
    pub non_retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_seconds: 5,
            use_exponential_backoff: true,
            max_delay_seconds: 300,
            jitter_factor: 0.2,
            non_retryable_status_codes: vec![400, 401, 403, 404, 422],
        }
    }
}

/// HMAC signature algorithm for payload signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Md5 => "md5",
        }
    }
}

/// Payload signature settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityConfig {
    pub enable_signature_validation: bool,
    /// Shared secret, at least 16 characters when signing is enabled.
    pub signature_secret: Option<String>,
    pub signature_header: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_signature_validation: false,
            signature_secret: None,
            signature_header: "X-Webhook-Signature".into(),
            signature_algorithm: SignatureAlgorithm::Sha256,
        }
    }
}

/// Instance-level delivery filters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// Allow-list: when non-empty, only these instances are delivered.
    pub instances: Vec<String>,
    /// Deny-list: these instances are never delivered.
    pub exclude_instances: Vec<String>,
}

/// Execution counters; monotonic except `last_execution_error`, which is
/// cleared on success.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookStats {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub last_execution_status: Option<ExecutionStatus>,
    pub last_execution_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Outcome of one settled delivery, recorded into the stats counters.
/// The execution timestamp is stamped by the storage layer.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    /// Failure description; `None` on success.
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhook {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub events: Vec<EventKind>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub authentication: WebhookAuth,
    #[serde(default)]
    pub retry_config: RetryConfig,
    #[serde(default)]
    pub security_config: SecurityConfig,
    #[serde(default)]
    pub filter_config: FilterConfig,
    #[serde(default = "default_timeout_ms", rename = "timeout")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhook {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub events: Option<Vec<EventKind>>,
    pub headers: Option<HashMap<String, String>>,
    pub authentication: Option<WebhookAuth>,
    pub retry_config: Option<RetryConfig>,
    pub security_config: Option<SecurityConfig>,
    pub filter_config: Option<FilterConfig>,
    #[serde(rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

/// Validate a subscriber URL.
///
/// Scheme must be http or https. Unless `allow_private` (development
/// mode), loopback and RFC 1918 hosts are rejected.
pub fn validate_url(raw: &str, allow_private: bool) -> HermodResult<()> {
    let url = Url::parse(raw)
        .map_err(|e| HermodError::validation(format!("invalid webhook URL: {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(HermodError::validation(
            "webhook URL scheme must be http or https",
        ));
    }

    let Some(host) = url.host_str() else {
        return Err(HermodError::validation("webhook URL must have a host"));
    };

    if !allow_private {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(HermodError::validation(
                "webhook URL must not point at loopback in production",
            ));
        }
        if let Ok(addr) = IpAddr::from_str(host)
            && is_private_addr(&addr)
        {
            return Err(HermodError::validation(
                "webhook URL must not point at a private address in production",
            ));
        }
    }

    Ok(())
}

fn is_private_addr(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

/// Validate the tunable ranges of a retry configuration.
pub fn validate_retry_config(config: &RetryConfig) -> HermodResult<()> {
    if !(1..=20).contains(&config.max_attempts) {
        return Err(HermodError::validation(
            "retry maxAttempts must be between 1 and 20",
        ));
    }
    if !(1..=300).contains(&config.initial_delay_seconds) {
        return Err(HermodError::validation(
            "retry initialDelaySeconds must be between 1 and 300",
        ));
    }
    if !(1..=3600).contains(&config.max_delay_seconds) {
        return Err(HermodError::validation(
            "retry maxDelaySeconds must be between 1 and 3600",
        ));
    }
    if !(0.0..=1.0).contains(&config.jitter_factor) {
        return Err(HermodError::validation(
            "retry jitterFactor must be between 0 and 1",
        ));
    }
    Ok(())
}

/// Validate signature settings: when enabled, a secret of at least
/// 16 characters is required.
pub fn validate_security_config(config: &SecurityConfig) -> HermodResult<()> {
    if config.enable_signature_validation {
        match &config.signature_secret {
            Some(secret) if secret.len() >= 16 => {}
            _ => {
                return Err(HermodError::validation(
                    "signature secret must be at least 16 characters",
                ));
            }
        }
    }
    Ok(())
}

/// Validate the per-request timeout (1000–60000 ms).
pub fn validate_timeout(timeout_ms: u64) -> HermodResult<()> {
    if !(1000..=60_000).contains(&timeout_ms) {
        return Err(HermodError::validation(
            "timeout must be between 1000 and 60000 milliseconds",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_discriminator_round_trips() {
        let auth = WebhookAuth::ApiKey {
            token: "tok".into(),
            header: "X-Api-Key".into(),
        };
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["type"], "apiKey");

        let back: WebhookAuth = serde_json::from_value(json).unwrap();
        match back {
            WebhookAuth::ApiKey { token, header } => {
                assert_eq!(token, "tok");
                assert_eq!(header, "X-Api-Key");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn auth_missing_fields_rejected() {
        let err = serde_json::from_str::<WebhookAuth>(r#"{"type":"bearer"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn url_scheme_and_private_ranges() {
        assert!(validate_url("https://hooks.example.com/in", false).is_ok());
        assert!(validate_url("ftp://example.com", false).is_err());
        assert!(validate_url("http://localhost:3000/hook", false).is_err());
        assert!(validate_url("http://127.0.0.1/hook", false).is_err());
        assert!(validate_url("http://10.0.0.4/hook", false).is_err());
        assert!(validate_url("http://192.168.1.10/hook", false).is_err());
        // Development mode allows all of the above.
        assert!(validate_url("http://127.0.0.1/hook", true).is_ok());
        assert!(validate_url("http://192.168.1.10/hook", true).is_ok());
    }

    #[test]
    fn retry_config_ranges() {
        assert!(validate_retry_config(&RetryConfig::default()).is_ok());

        let mut config = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(validate_retry_config(&config).is_err());

        config.max_attempts = 21;
        assert!(validate_retry_config(&config).is_err());

        config.max_attempts = 3;
        config.jitter_factor = 1.5;
        assert!(validate_retry_config(&config).is_err());
    }

    #[test]
    fn signature_secret_length() {
        let config = SecurityConfig {
            enable_signature_validation: true,
            signature_secret: Some("short".into()),
            ..Default::default()
        };
        assert!(validate_security_config(&config).is_err());

        let config = SecurityConfig {
            enable_signature_validation: true,
            signature_secret: Some("0123456789abcdef".into()),
            ..Default::default()
        };
        assert!(validate_security_config(&config).is_ok());

        // Disabled signing does not require a secret.
        assert!(validate_security_config(&SecurityConfig::default()).is_ok());
    }

    #[test]
    fn timeout_range() {
        assert!(validate_timeout(999).is_err());
        assert!(validate_timeout(1000).is_ok());
        assert!(validate_timeout(60_000).is_ok());
        assert!(validate_timeout(60_001).is_err());
    }
}
