//! Traits shared between the registry client and the reconciler

use crate::error::Result;
use async_trait::async_trait;

/// The registry operations reconciliation depends on
///
/// [`crate::registry::RegistryClient`] is the HTTP implementation; the trait
/// lets the reconciler run against any other source of the same operations.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// All repository names, in registry order
    async fn list_repositories(&self) -> Result<Vec<String>>;

    /// Tag names of one repository; empty when the registry reports none
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;

    /// Content digest the tag currently points at
    async fn resolve_digest(&self, repository: &str, tag: &str) -> Result<String>;

    /// Delete a manifest addressed by digest
    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()>;
}
