//! Configuration for the assets gateway.
//!
//! Configuration is a plain value: it is loaded once at process start
//! and handed by reference into the composition code. There is no
//! process-wide mutable "current configuration".
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values (JSON, path from `ASSETS_GW_CONFIG`)
//! 2. Environment variables
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ASSETS_GW_BIND` → server.host
//! - `ASSETS_GW_PORT` → server.port
//! - `ASSETS_GW_AUTH_MODE` → auth.mode (local | cookie | bearer)
//! - `OPENID_BASE_URL` → auth.openid_base_url
//! - `OPENID_CLIENT_ID` → auth.client_id
//! - `OPENID_CLIENT_SECRET` → auth.client_secret

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication gate selection and identity-provider settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Base URLs of the backing asset stores
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    2458
}

/// Which authentication gate the gateway runs with.
///
/// A closed set, selected once at startup. `Local` must never be used
/// in a deployed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Development bypass with a fixed identity
    #[default]
    Local,
    /// Session token from a named cookie, validated via cache + provider
    Cookie,
    /// Bearer token validated against the provider on every call
    Bearer,
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// Identity provider base URL, required for cookie/bearer modes
    #[serde(default)]
    pub openid_base_url: Option<String>,

    /// OIDC client id, required for cookie/bearer modes
    #[serde(default)]
    pub client_id: Option<String>,

    /// OIDC client secret, required for cookie/bearer modes
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Name of the session cookie consulted by the cookie gate
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cache TTL (seconds) used when the provider supplies no expiry
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Local,
            openid_base_url: None,
            client_id: None,
            client_secret: None,
            cookie_name: default_cookie_name(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cookie_name() -> String {
    "gw_session".into()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

/// Base URLs of the backing services, one per asset kind.
///
/// The data store speaks to a docdb record service and carries the
/// companion storage base URL for building content links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "default_flux_url")]
    pub flux_url: String,

    #[serde(default = "default_cdn_url")]
    pub cdn_url: String,

    #[serde(default = "default_docdb_url")]
    pub docdb_url: String,

    #[serde(default = "default_storage_url")]
    pub storage_url: String,

    #[serde(default = "default_stories_url")]
    pub stories_url: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            flux_url: default_flux_url(),
            cdn_url: default_cdn_url(),
            docdb_url: default_docdb_url(),
            storage_url: default_storage_url(),
            stories_url: default_stories_url(),
        }
    }
}

fn default_flux_url() -> String {
    "http://flux-backend".into()
}

fn default_cdn_url() -> String {
    "http://cdn-backend".into()
}

fn default_docdb_url() -> String {
    "http://docdb/api".into()
}

fn default_storage_url() -> String {
    "http://storage/api".into()
}

fn default_stories_url() -> String {
    "http://stories-backend".into()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Config {
    /// Load configuration from the default location with env overrides.
    ///
    /// The config file path comes from `ASSETS_GW_CONFIG`; a missing
    /// file yields the defaults so a bare `local` profile needs no file
    /// at all.
    pub fn load() -> Result<Self> {
        let path = std::env::var("ASSETS_GW_CONFIG")
            .unwrap_or_else(|_| "assets-gateway.json".into());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ASSETS_GW_BIND") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ASSETS_GW_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(mode) = std::env::var("ASSETS_GW_AUTH_MODE") {
            match mode.as_str() {
                "local" => self.auth.mode = AuthMode::Local,
                "cookie" => self.auth.mode = AuthMode::Cookie,
                "bearer" => self.auth.mode = AuthMode::Bearer,
                other => tracing::warn!(mode = %other, "Ignoring unknown auth mode"),
            }
        }
        if let Ok(v) = std::env::var("OPENID_BASE_URL") {
            self.auth.openid_base_url = Some(v);
        }
        if let Ok(v) = std::env::var("OPENID_CLIENT_ID") {
            self.auth.client_id = Some(v);
        }
        if let Ok(v) = std::env::var("OPENID_CLIENT_SECRET") {
            self.auth.client_secret = Some(v);
        }
    }

    /// Validate the configuration for the selected auth mode.
    ///
    /// Deployed profiles (cookie/bearer) require the identity-provider
    /// settings; the error names every missing key so a misconfigured
    /// deployment fails fast with a usable message.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("backends.flux_url", &self.backends.flux_url),
            ("backends.cdn_url", &self.backends.cdn_url),
            ("backends.docdb_url", &self.backends.docdb_url),
            ("backends.storage_url", &self.backends.storage_url),
            ("backends.stories_url", &self.backends.stories_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{name}: {e}")))?;
        }

        if self.auth.mode == AuthMode::Local {
            return Ok(());
        }

        let mut missing = Vec::new();
        if self.auth.openid_base_url.is_none() {
            missing.push("auth.openid_base_url (OPENID_BASE_URL)");
        }
        if self.auth.client_id.is_none() {
            missing.push("auth.client_id (OPENID_CLIENT_ID)");
        }
        if self.auth.client_secret.is_none() {
            missing.push("auth.client_secret (OPENID_CLIENT_SECRET)");
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}
