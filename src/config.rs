//! Proxy configuration loaded from environment variables.
//!
//! The configuration is read once at startup and shared immutably through
//! [`ApiState`](crate::api::ApiState). Upstream settings are optional at load
//! time: a request that needs a missing setting fails with a configuration
//! error instead of the whole process refusing to start.

use crate::error::{Error, Result};

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESOURCE_TIMEOUT_SECS: u64 = 15;

/// Raw environment values, keyed by the lowercased variable names.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    joplin_data_api_url: Option<String>,
    joplin_data_api_token: Option<String>,
    joplin_server_url: Option<String>,
    joplin_username: Option<String>,
    joplin_password: Option<String>,
    allowed_folder_ids: Option<String>,
    notes_url_prefix: Option<String>,
    public_base_url: Option<String>,
    ip_whitelist: Option<String>,
    required_user_agent: Option<String>,
    cache_dir: Option<String>,
    #[serde(default)]
    sanitize_strip: bool,
    bind_addr: Option<String>,
    metadata_timeout_secs: Option<u64>,
    resource_timeout_secs: Option<u64>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Data API base URL, without trailing slash.
    pub data_api_url: Option<String>,
    pub data_api_token: Option<String>,

    /// Web server base URL (sessions and shares), without trailing slash.
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,

    /// When set, only notes whose parent folder is listed are served.
    pub allowed_folders: Option<HashSet<String>>,

    /// Path prefix the service is mounted under, e.g. `/proxy`. Empty when
    /// mounted at the root. Never ends with a slash.
    pub url_prefix: String,

    /// Origin prepended to rewritten resource URLs. Empty keeps them
    /// root-relative.
    pub public_base_url: String,

    /// Client IPs allowed to fetch notes and resources.
    pub ip_whitelist: Option<HashSet<String>>,

    /// Case-insensitive substring the `User-Agent` header must contain.
    pub required_user_agent: Option<String>,

    pub cache_dir: PathBuf,

    /// Drop disallowed markup instead of escaping it.
    pub strip_disallowed: bool,

    pub bind_addr: String,
    pub metadata_timeout: Duration,
    pub resource_timeout: Duration,
}

impl ProxyConfig {
    /// Load configuration from the process environment.
    ///
    /// Recognized variables:
    /// - `JOPLIN_DATA_API_URL`, `JOPLIN_DATA_API_TOKEN`: Data API access
    /// - `JOPLIN_SERVER_URL`, `JOPLIN_USERNAME`, `JOPLIN_PASSWORD`: share access
    /// - `ALLOWED_FOLDER_IDS`: comma-separated folder ids
    /// - `NOTES_URL_PREFIX`: reverse-proxy mount prefix
    /// - `PUBLIC_BASE_URL`: origin for rewritten resource links
    /// - `IP_WHITELIST`: comma-separated client IPs
    /// - `REQUIRED_USER_AGENT`: required `User-Agent` substring
    /// - `CACHE_DIR` (default: "cache"), `SANITIZE_STRIP` (default: false)
    /// - `BIND_ADDR` (default: "0.0.0.0:8000")
    /// - `METADATA_TIMEOUT_SECS` (default: 10), `RESOURCE_TIMEOUT_SECS` (default: 15)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(config::Environment::default().ignore_empty(true))
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment.
    pub fn from_map(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        Self::load(
            config::Environment::default()
                .ignore_empty(true)
                .source(Some(vars)),
        )
    }

    fn load(environment: config::Environment) -> anyhow::Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        let config = Self::from_raw(raw);

        tracing::info!(
            data_api_url = config.data_api_url.as_deref().unwrap_or("<unset>"),
            server_url = config.server_url.as_deref().unwrap_or("<unset>"),
            url_prefix = %config.url_prefix,
            cache_dir = %config.cache_dir.display(),
            folder_filter = config.allowed_folders.as_ref().map_or(0, HashSet::len),
            strip_disallowed = config.strip_disallowed,
            "proxy configuration loaded"
        );

        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Self {
        Self {
            data_api_url: non_empty(raw.joplin_data_api_url).map(trim_trailing_slash),
            data_api_token: non_empty(raw.joplin_data_api_token),
            server_url: non_empty(raw.joplin_server_url).map(trim_trailing_slash),
            username: non_empty(raw.joplin_username),
            password: non_empty(raw.joplin_password),
            allowed_folders: raw.allowed_folder_ids.as_deref().and_then(parse_list),
            url_prefix: normalize_prefix(raw.notes_url_prefix.as_deref().unwrap_or("")),
            public_base_url: non_empty(raw.public_base_url)
                .map(trim_trailing_slash)
                .unwrap_or_default(),
            ip_whitelist: raw.ip_whitelist.as_deref().and_then(parse_list),
            required_user_agent: non_empty(raw.required_user_agent)
                .map(|agent| agent.to_lowercase()),
            cache_dir: PathBuf::from(
                non_empty(raw.cache_dir).unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
            ),
            strip_disallowed: raw.sanitize_strip,
            bind_addr: non_empty(raw.bind_addr)
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            metadata_timeout: Duration::from_secs(
                raw.metadata_timeout_secs
                    .unwrap_or(DEFAULT_METADATA_TIMEOUT_SECS),
            ),
            resource_timeout: Duration::from_secs(
                raw.resource_timeout_secs
                    .unwrap_or(DEFAULT_RESOURCE_TIMEOUT_SECS),
            ),
        }
    }

    /// Data API base URL and token, or a configuration error.
    pub fn data_api(&self) -> Result<(&str, &str)> {
        let url = self
            .data_api_url
            .as_deref()
            .ok_or(Error::Config("JOPLIN_DATA_API_URL"))?;
        let token = self
            .data_api_token
            .as_deref()
            .ok_or(Error::Config("JOPLIN_DATA_API_TOKEN"))?;
        Ok((url, token))
    }

    /// Web server base URL and login credentials, or a configuration error.
    pub fn server_login(&self) -> Result<(&str, &str, &str)> {
        let url = self
            .server_url
            .as_deref()
            .ok_or(Error::Config("JOPLIN_SERVER_URL"))?;
        let username = self
            .username
            .as_deref()
            .ok_or(Error::Config("JOPLIN_USERNAME"))?;
        let password = self
            .password
            .as_deref()
            .ok_or(Error::Config("JOPLIN_PASSWORD"))?;
        Ok((url, username, password))
    }

    /// Public URL of a resource, honoring the mount prefix.
    pub fn resource_url(&self, resource_id: &str) -> String {
        format!(
            "{}{}/v1/r/{resource_id}",
            self.public_base_url, self.url_prefix
        )
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trim_trailing_slash(value: String) -> String {
    value.trim_end_matches('/').to_string()
}

fn parse_list(value: &str) -> Option<HashSet<String>> {
    let items: HashSet<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
