//! Configuration for registry access
//!
//! [`Credentials`] identify the registry and the account used against its token
//! endpoint; [`RegistryConfig`] holds transport settings. Both are built once
//! at startup and handed to the clients read-only.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const ENV_HOSTNAME: &str = "REGISTRY_SYNC_HOSTNAME";
pub const ENV_USERNAME: &str = "REGISTRY_SYNC_USERNAME";
pub const ENV_PASSWORD: &str = "REGISTRY_SYNC_PASSWORD";
pub const ENV_TIMEOUT: &str = "REGISTRY_SYNC_TIMEOUT";
pub const ENV_SKIP_TLS: &str = "REGISTRY_SYNC_SKIP_TLS";
pub const ENV_PAGE_SIZE: &str = "REGISTRY_SYNC_PAGE_SIZE";
pub const ENV_TOKEN_TTL: &str = "REGISTRY_SYNC_TOKEN_TTL";

/// Registry location and account
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(hostname: String, username: String, password: String) -> Self {
        Self {
            hostname,
            username,
            password,
        }
    }

    /// Reads any of the three fields that are present in the environment
    pub fn from_env() -> (Option<String>, Option<String>, Option<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> (Option<String>, Option<String>, Option<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        (
            lookup(ENV_HOSTNAME),
            lookup(ENV_USERNAME),
            lookup(ENV_PASSWORD),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(RegistryError::Config(
                "Registry hostname cannot be empty".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(RegistryError::Config(
                "Username cannot be empty".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(RegistryError::Config(
                "Password cannot be empty".to_string(),
            ));
        }
        self.base_url().map(|_| ())
    }

    /// `https://<hostname>`, unless the hostname already names a scheme
    pub fn base_url(&self) -> Result<String> {
        let hostname = self.hostname.trim().trim_end_matches('/');
        let base = if hostname.starts_with("http://") || hostname.starts_with("https://") {
            hostname.to_string()
        } else {
            format!("https://{}", hostname)
        };

        let parsed = Url::parse(&base)?;
        if parsed.host_str().is_none() {
            return Err(RegistryError::Config(format!(
                "Invalid registry hostname: {}",
                self.hostname
            )));
        }

        Ok(base)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport settings shared by the token and registry clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub skip_tls: bool,
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// Page size (`n`) sent to the catalog and tag list endpoints
    pub page_size: Option<usize>,
    /// Seconds a scoped token may be reused; `None` fetches a token per call
    pub token_ttl: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            skip_tls: false,
            timeout: 30,
            page_size: None,
            token_ttl: None,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_token_ttl(mut self, token_ttl: Option<u64>) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            return Err(RegistryError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.timeout > 86400 {
            return Err(RegistryError::Config(
                "Timeout cannot exceed 24 hours (86400 seconds)".to_string(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(RegistryError::Config(
                "Page size must be greater than 0".to_string(),
            ));
        }
        if self.token_ttl == Some(0) {
            return Err(RegistryError::Config(
                "Token TTL must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_TIMEOUT) {
            if let Ok(timeout) = val.parse() {
                config.timeout = timeout;
            }
        }
        if let Some(val) = lookup(ENV_SKIP_TLS) {
            config.skip_tls = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(val) = lookup(ENV_PAGE_SIZE) {
            config.page_size = val.parse().ok();
        }
        if let Some(val) = lookup(ENV_TOKEN_TTL) {
            config.token_ttl = val.parse().ok();
        }

        config
    }
}
