//! Server configuration.

use std::collections::HashMap;

/// Configuration for the HTTP server, read from `HERMOD_*` environment
/// variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// Value required in the `apikey` request header.
    pub api_key: String,
    /// Development mode: webhook URLs may point at loopback and
    /// private ranges.
    pub dev_mode: bool,
    /// Instance name → base URL of the backend worker handling sends.
    /// Membership is explicit; there is no dynamic discovery.
    pub instance_endpoints: HashMap<String, String>,
    /// Redis URL for the shared rotation cache. `None` keeps rotation
    /// state process-local.
    pub redis_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            api_key: String::new(),
            dev_mode: false,
            instance_endpoints: HashMap::new(),
            redis_url: None,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// `HERMOD_INSTANCE_ENDPOINTS` is a comma-separated list of
    /// `name=url` pairs.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("HERMOD_BIND_ADDR").unwrap_or(defaults.bind_addr),
            api_key: std::env::var("HERMOD_API_KEY").unwrap_or(defaults.api_key),
            dev_mode: std::env::var("HERMOD_DEV_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.dev_mode),
            instance_endpoints: std::env::var("HERMOD_INSTANCE_ENDPOINTS")
                .map(|raw| parse_endpoint_map(&raw))
                .unwrap_or(defaults.instance_endpoints),
            redis_url: std::env::var("HERMOD_REDIS_URL").ok(),
        }
    }
}

fn parse_endpoint_map(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, url) = pair.split_once('=')?;
            let name = name.trim();
            let url = url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}
