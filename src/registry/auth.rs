//! Token authentication against the registry's `/auth` endpoint

use crate::config::Credentials;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Service name the token server expects in every request
pub const TOKEN_SERVICE: &str = "registry";

/// Action and resource a token is requested for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// `registry:catalog:*`
    pub fn catalog() -> Self {
        Self("registry:catalog:*".to_string())
    }

    /// `repository:<name>:*`
    pub fn repository(name: &str) -> Self {
        Self(format!("repository:{}:*", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived token scoped to one registry action
#[derive(Clone)]
pub struct BearerToken {
    token: String,
    expires_in: Option<u64>,
}

impl BearerToken {
    pub fn new(token: String, expires_in: Option<u64>) -> Self {
        Self { token, expires_in }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Lifetime in seconds, when the token server reports one
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

impl TokenResponse {
    /// First non-empty of `token` and `access_token`
    fn into_token(self) -> Option<BearerToken> {
        let expires_in = self.expires_in;
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
            .map(|token| BearerToken::new(token, expires_in))
    }
}

/// Exchanges credentials for scoped bearer tokens
#[derive(Clone)]
pub struct TokenClient {
    client: Client,
    auth_url: String,
    credentials: Arc<Credentials>,
    output: Logger,
}

impl TokenClient {
    pub fn new(client: Client, credentials: Arc<Credentials>, output: Logger) -> Result<Self> {
        let auth_url = format!("{}/auth", credentials.base_url()?);
        Ok(Self {
            client,
            auth_url,
            credentials,
            output,
        })
    }

    /// Request a fresh token for `scope`; no retry, no caching
    pub async fn get_token(&self, scope: &Scope) -> Result<BearerToken> {
        if scope.as_str().trim().is_empty() {
            return Err(RegistryError::Auth(
                "Token scope cannot be empty".to_string(),
            ));
        }

        self.output
            .detail(&format!("Requesting token for scope {}", scope));

        let form = [
            ("account", self.credentials.username.as_str()),
            ("scope", scope.as_str()),
            ("service", TOKEN_SERVICE),
        ];

        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                RegistryError::Auth(NetworkErrorHandler::describe(&e, "token request"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            RegistryError::Auth(format!("Failed to parse token response: {}", e))
        })?;

        token_response.into_token().ok_or_else(|| {
            RegistryError::Auth(format!("Token response for {} has no token field", scope))
        })
    }
}
