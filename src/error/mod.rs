//! Error types for registry and reconciliation operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Token acquisition failed or the token response was malformed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Repository catalog could not be listed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Tag list for a repository could not be fetched
    #[error("Tag list error for {repository}: {message}")]
    TagList { repository: String, message: String },

    /// Manifest lookup returned no digest for the reference
    #[error("Manifest not found: {repository}:{reference}")]
    ManifestNotFound {
        repository: String,
        reference: String,
    },

    /// Delete call failed
    #[error("Delete error for {repository}@{digest}: {message}")]
    Delete {
        repository: String,
        digest: String,
        message: String,
    },

    /// Registry refused the delete because deletion is disabled server-side
    #[error(
        "Deletion is disabled on the registry (refused {repository}@{digest}); enable storage.delete on the server"
    )]
    DeletionDisabled { repository: String, digest: String },

    /// Unexpected status on a read request
    #[error("HTTP error during {operation} (status {status}): {message}")]
    Http {
        operation: String,
        status: u16,
        message: String,
    },

    /// Transport failure on a read that has no more specific error kind
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RegistryError {
    /// Short stable name of the error kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Auth(_) => "auth",
            RegistryError::Catalog(_) => "catalog",
            RegistryError::TagList { .. } => "tag-list",
            RegistryError::ManifestNotFound { .. } => "manifest-not-found",
            RegistryError::Delete { .. } => "delete",
            RegistryError::DeletionDisabled { .. } => "deletion-disabled",
            RegistryError::Http { .. } => "http",
            RegistryError::Network(_) => "network",
            RegistryError::Config(_) => "config",
            RegistryError::Io(_) => "io",
            RegistryError::Parse(_) => "parse",
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Config(err.to_string())
    }
}
