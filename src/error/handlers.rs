//! Status-code and transport error mapping for registry calls

use crate::error::RegistryError;
use reqwest::StatusCode;

/// Maps non-success HTTP responses to the error kind of the failing operation
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> RegistryError {
        let error_msg = match status.as_u16() {
            400 => "Invalid token request parameters".to_string(),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!("Token request failed (status {}): {}", status, error_text),
        };

        RegistryError::Auth(error_msg)
    }

    pub fn handle_catalog_error(status: StatusCode, error_text: &str) -> RegistryError {
        RegistryError::Catalog(Self::describe(status, error_text, "catalog listing"))
    }

    pub fn handle_tag_list_error(
        repository: &str,
        status: StatusCode,
        error_text: &str,
    ) -> RegistryError {
        RegistryError::TagList {
            repository: repository.to_string(),
            message: Self::describe(status, error_text, "tag listing"),
        }
    }

    /// 404 means the tag is gone; anything else is an unexpected read failure
    pub fn handle_manifest_error(
        repository: &str,
        reference: &str,
        status: StatusCode,
        error_text: &str,
    ) -> RegistryError {
        if status == StatusCode::NOT_FOUND {
            return RegistryError::ManifestNotFound {
                repository: repository.to_string(),
                reference: reference.to_string(),
            };
        }

        RegistryError::Http {
            operation: format!("manifest lookup for {}:{}", repository, reference),
            status: status.as_u16(),
            message: Self::describe(status, error_text, "manifest lookup"),
        }
    }

    /// 405 is what a registry answers when `storage.delete` is off
    pub fn handle_delete_error(
        repository: &str,
        digest: &str,
        status: StatusCode,
        error_text: &str,
    ) -> RegistryError {
        if status == StatusCode::METHOD_NOT_ALLOWED || error_text.contains("UNSUPPORTED") {
            return RegistryError::DeletionDisabled {
                repository: repository.to_string(),
                digest: digest.to_string(),
            };
        }

        RegistryError::Delete {
            repository: repository.to_string(),
            digest: digest.to_string(),
            message: Self::describe(status, error_text, "manifest delete"),
        }
    }

    fn describe(status: StatusCode, error_text: &str, operation: &str) -> String {
        match status.as_u16() {
            401 => format!("Unauthorized to perform {}: {}", operation, error_text),
            403 => format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            ),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        }
    }
}

/// Network error categorization
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Human readable description of a transport failure; the caller picks the error kind
    pub fn describe(error: &reqwest::Error, context: &str) -> String {
        if error.is_timeout() {
            format!("{} timed out: {}", context, error)
        } else if error.is_connect() {
            format!("Connection error during {}: {}", context, error)
        } else if error.to_string().contains("certificate") {
            format!("TLS certificate error during {}: {}", context, error)
        } else if error.is_decode() {
            format!("Malformed response during {}: {}", context, error)
        } else {
            format!("{} network error: {}", context, error)
        }
    }
}
