//! Common utilities and helper functions

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use std::time::{Duration, Instant};

/// Timing utilities
pub struct Timer {
    start: Instant,
    description: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(description: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            description: description.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log elapsed time using provided logger
    pub fn log_elapsed(&self, logger: &Logger) {
        logger.info(&format!(
            "{} completed in {}",
            self.description,
            logger.format_duration(self.elapsed())
        ));
    }
}

/// Validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate repository name
    pub fn validate_repository(repository: &str) -> Result<()> {
        if repository.is_empty() {
            return Err(RegistryError::Config(
                "Repository cannot be empty".to_string(),
            ));
        }

        if repository.contains("//") || repository.starts_with('/') || repository.ends_with('/') {
            return Err(RegistryError::Config(format!(
                "Invalid repository format: {}",
                repository
            )));
        }

        Ok(())
    }

    /// Validate reference (tag or digest)
    pub fn validate_reference(reference: &str) -> Result<()> {
        if reference.is_empty() {
            return Err(RegistryError::Config(
                "Reference cannot be empty".to_string(),
            ));
        }

        if reference.contains(char::is_whitespace) || reference.contains('/') {
            return Err(RegistryError::Config(format!(
                "Invalid reference: {}",
                reference
            )));
        }

        Ok(())
    }

    /// Whether `reference` has the `<algorithm>:<hex>` shape of a content digest
    pub fn is_digest(reference: &str) -> bool {
        Self::validate_digest(reference).is_ok()
    }

    /// Validate digest format
    pub fn validate_digest(digest: &str) -> Result<()> {
        let (algorithm, encoded) = digest.split_once(':').ok_or_else(|| {
            RegistryError::Config(format!("Digest must be <algorithm>:<hex>: {}", digest))
        })?;

        if algorithm.is_empty()
            || !algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c))
        {
            return Err(RegistryError::Config(format!(
                "Invalid digest algorithm: {}",
                digest
            )));
        }

        let expected_len = match algorithm {
            "sha256" => Some(64),
            "sha512" => Some(128),
            _ => None,
        };

        if encoded.is_empty() || expected_len.is_some_and(|len| encoded.len() != len) {
            return Err(RegistryError::Config(format!(
                "Invalid digest length for {}: {}",
                algorithm, digest
            )));
        }

        if !encoded.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::Config(
                "Digest must contain only hexadecimal characters".to_string(),
            ));
        }

        Ok(())
    }
}
