//! HTTP client for the Docker Registry v2 API
//!
//! Covers the read and delete operations reconciliation needs:
//! - Catalog listing (GET /v2/_catalog)
//! - Tag listing (GET /v2/{name}/tags/list)
//! - Digest resolution (GET /v2/{name}/manifests/{tag})
//! - Manifest deletion (DELETE /v2/{name}/manifests/{digest})
//!
//! Every request is preceded by a token fetch scoped to exactly that request.

use crate::common::{RegistryApi, ValidationUtils};
use crate::config::{Credentials, RegistryConfig};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::{BearerToken, Scope, TokenClient};
use crate::registry::pagination::PageCursor;
use crate::registry::token_cache::TokenCache;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header::ACCEPT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DIGEST_HEADER: &str = "Docker-Content-Digest";

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TagListResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

pub struct RegistryClientBuilder {
    credentials: Credentials,
    config: RegistryConfig,
    output: Option<Logger>,
}

impl RegistryClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: RegistryConfig::default(),
            output: None,
        }
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        self.credentials.validate()?;
        self.config.validate()?;

        let mut builder = Client::builder().timeout(self.config.request_timeout());
        if self.config.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let output = self.output.unwrap_or_else(|| Logger::new(false));
        let address = self.credentials.base_url()?;
        let credentials = Arc::new(self.credentials);
        let tokens = TokenClient::new(client.clone(), credentials, output.clone())?;
        let token_cache = self
            .config
            .token_ttl
            .map(|ttl| TokenCache::new(Duration::from_secs(ttl)));

        Ok(RegistryClient {
            client,
            address,
            tokens,
            token_cache,
            page_size: self.config.page_size,
            output,
        })
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    address: String,
    tokens: TokenClient,
    token_cache: Option<TokenCache>,
    page_size: Option<usize>,
    output: Logger,
}

impl RegistryClient {
    pub fn builder(credentials: Credentials) -> RegistryClientBuilder {
        RegistryClientBuilder::new(credentials)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// All repository names, following catalog pagination to the end
    pub async fn list_repositories(&self) -> Result<Vec<String>> {
        self.output.verbose("Listing registry catalog");

        let scope = Scope::catalog();
        let mut pages = PageCursor::new(self.paged_url("/v2/_catalog")?);
        let mut repositories = Vec::new();

        while let Some(page_url) = pages.next_url() {
            let response = self
                .execute(
                    &scope,
                    |token| self.client.get(page_url.clone()).bearer_auth(token),
                    "catalog listing",
                    RegistryError::Catalog,
                )
                .await?;

            let status = response.status();
            if !status.is_success() {
                let error_text = Self::error_text(response).await;
                return Err(HttpErrorHandler::handle_catalog_error(status, &error_text));
            }

            pages.advance(response.headers(), &page_url)?;

            let page: CatalogResponse = response.json().await.map_err(|e| {
                RegistryError::Catalog(format!("Failed to parse catalog response: {}", e))
            })?;
            repositories.extend(page.repositories.unwrap_or_default());
        }

        self.output
            .detail(&format!("Found {} repositories", repositories.len()));
        Ok(repositories)
    }

    /// Tags of `repository`; a response without a `tags` field means no tags
    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        ValidationUtils::validate_repository(repository)?;
        self.output
            .verbose(&format!("Listing tags for repository: {}", repository));

        let scope = Scope::repository(repository);
        let first = self.paged_url(&format!("/v2/{}/tags/list", repository))?;
        let mut pages = PageCursor::new(first);
        let mut tags = Vec::new();

        while let Some(page_url) = pages.next_url() {
            let response = self
                .execute(
                    &scope,
                    |token| self.client.get(page_url.clone()).bearer_auth(token),
                    "tag listing",
                    |message| RegistryError::TagList {
                        repository: repository.to_string(),
                        message,
                    },
                )
                .await?;

            let status = response.status();
            if !status.is_success() {
                let error_text = Self::error_text(response).await;
                return Err(HttpErrorHandler::handle_tag_list_error(
                    repository,
                    status,
                    &error_text,
                ));
            }

            pages.advance(response.headers(), &page_url)?;

            let page: TagListResponse =
                response.json().await.map_err(|e| RegistryError::TagList {
                    repository: repository.to_string(),
                    message: format!("Failed to parse tags response: {}", e),
                })?;
            tags.extend(page.tags.unwrap_or_default());
        }

        self.output.detail(&format!(
            "Found {} tags for repository {}",
            tags.len(),
            repository
        ));
        Ok(tags)
    }

    /// Digest `tag` points at, read from the `Docker-Content-Digest` header
    pub async fn resolve_digest(&self, repository: &str, tag: &str) -> Result<String> {
        ValidationUtils::validate_repository(repository)?;
        ValidationUtils::validate_reference(tag)?;
        self.output
            .verbose(&format!("Resolving digest for {}:{}", repository, tag));

        let url = format!("{}/v2/{}/manifests/{}", self.address, repository, tag);
        let response = self
            .execute(
                &Scope::repository(repository),
                |token| {
                    self.client
                        .get(&url)
                        .header(ACCEPT, MANIFEST_V2_MEDIA_TYPE)
                        .bearer_auth(token)
                },
                "manifest lookup",
                RegistryError::Network,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = Self::error_text(response).await;
            return Err(HttpErrorHandler::handle_manifest_error(
                repository,
                tag,
                status,
                &error_text,
            ));
        }

        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RegistryError::ManifestNotFound {
                repository: repository.to_string(),
                reference: tag.to_string(),
            })?;

        ValidationUtils::validate_digest(&digest).map_err(|_| {
            RegistryError::Parse(format!(
                "Registry returned an invalid digest for {}:{}: {}",
                repository, tag, digest
            ))
        })?;

        self.output
            .detail(&format!("{}:{} -> {}", repository, tag, digest));
        Ok(digest)
    }

    /// Delete the manifest addressed by `digest`; tag names are refused
    pub async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        ValidationUtils::validate_repository(repository)?;
        if !ValidationUtils::is_digest(digest) {
            return Err(RegistryError::Delete {
                repository: repository.to_string(),
                digest: digest.to_string(),
                message: "Manifests can only be deleted by digest".to_string(),
            });
        }

        self.output
            .verbose(&format!("Deleting manifest {}@{}", repository, digest));

        let url = format!("{}/v2/{}/manifests/{}", self.address, repository, digest);
        let response = self
            .execute(
                &Scope::repository(repository),
                |token| self.client.delete(&url).bearer_auth(token),
                "manifest delete",
                |message| RegistryError::Delete {
                    repository: repository.to_string(),
                    digest: digest.to_string(),
                    message,
                },
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = Self::error_text(response).await;
            return Err(HttpErrorHandler::handle_delete_error(
                repository,
                digest,
                status,
                &error_text,
            ));
        }

        Ok(())
    }

    /// Send one request with a token for `scope`
    ///
    /// With a token cache, a 401 drops the cached token and the request is
    /// sent once more with a fresh one.
    async fn execute<B, E>(
        &self,
        scope: &Scope,
        build: B,
        context: &str,
        on_transport: E,
    ) -> Result<Response>
    where
        B: Fn(&str) -> RequestBuilder,
        E: Fn(String) -> RegistryError,
    {
        let token = self.token_for(scope).await?;
        let response = build(token.as_str())
            .send()
            .await
            .map_err(|e| on_transport(NetworkErrorHandler::describe(&e, context)))?;

        self.output
            .detail(&format!("{} response status: {}", context, response.status()));

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(cache) = &self.token_cache {
                self.output.verbose(&format!(
                    "Token for {} rejected during {}, fetching a new one",
                    scope, context
                ));
                cache.invalidate(scope);
                let token = self.token_for(scope).await?;
                return build(token.as_str())
                    .send()
                    .await
                    .map_err(|e| on_transport(NetworkErrorHandler::describe(&e, context)));
            }
        }

        Ok(response)
    }

    async fn token_for(&self, scope: &Scope) -> Result<BearerToken> {
        let Some(cache) = &self.token_cache else {
            return self.tokens.get_token(scope).await;
        };

        if let Some(token) = cache.get(scope) {
            return Ok(token);
        }

        let token = self.tokens.get_token(scope).await?;
        cache.insert(scope.clone(), token.clone());
        Ok(token)
    }

    fn paged_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.address, path))?;
        if let Some(page_size) = self.page_size {
            url.query_pairs_mut()
                .append_pair("n", &page_size.to_string());
        }
        Ok(url)
    }

    async fn error_text(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string())
    }
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        RegistryClient::list_repositories(self).await
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        RegistryClient::list_tags(self, repository).await
    }

    async fn resolve_digest(&self, repository: &str, tag: &str) -> Result<String> {
        RegistryClient::resolve_digest(self, repository, tag).await
    }

    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        RegistryClient::delete_manifest(self, repository, digest).await
    }
}
