//! Logging and output control
//!
//! This module provides the [`Logger`] used for all user-visible output. It
//! supports quiet and verbose modes and doubles as the reconciliation
//! observer, so every deletion decision is printed before the registry call
//! that carries it out.

use crate::error::RegistryError;
use crate::reconcile::ReconcileObserver;
use std::time::Duration;

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("📝 {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("   {}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Error message, printed even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Failure line shared by resolve, lookup and delete failures
fn failure_message(repository: &str, tag: &str, error: &RegistryError) -> String {
    format!("Failed to process {}:{}: {}", repository, tag, error)
}

impl ReconcileObserver for Logger {
    fn repository_deletion(&self, repository: &str, tags: &[String]) {
        self.step(&format!(
            "Deleting docker registry repo {} ({} tags)",
            repository,
            tags.len()
        ));
    }

    fn tag_deletion(&self, repository: &str, tag: &str) {
        self.step(&format!(
            "Deleting docker registry tag {} for repo {}",
            tag, repository
        ));
    }

    fn manifest_deleted(&self, repository: &str, tag: &str, digest: &str) {
        self.detail(&format!("Deleted {}:{} ({})", repository, tag, digest));
    }

    fn tag_skipped(&self, repository: &str, tag: &str, reason: &str) {
        self.warning(&format!("Skipped {}:{}: {}", repository, tag, reason));
    }

    fn failure(&self, repository: &str, tag: &str, error: &RegistryError) {
        self.error(&failure_message(repository, tag, error));
    }
}
