//! Outcome reporting for a reconciliation pass

use crate::error::RegistryError;
use serde::Serialize;

/// Side-channel notified of deletion decisions and their outcome
///
/// Decisions are reported before the registry call that carries them out, so
/// an audit trail exists even when a later call fails.
pub trait ReconcileObserver: Send + Sync {
    /// A repository absent from the declaration is about to lose every tag
    fn repository_deletion(&self, _repository: &str, _tags: &[String]) {}

    /// An undeclared tag of a declared repository is about to be deleted
    fn tag_deletion(&self, _repository: &str, _tag: &str) {}

    fn manifest_deleted(&self, _repository: &str, _tag: &str, _digest: &str) {}

    fn tag_skipped(&self, _repository: &str, _tag: &str, _reason: &str) {}

    fn failure(&self, _repository: &str, _tag: &str, _error: &RegistryError) {}
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl ReconcileObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedTag {
    pub repository: String,
    pub tag: String,
    /// `None` in dry-run mode, where no digest is resolved
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTag {
    pub repository: String,
    pub tag: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTag {
    pub repository: String,
    pub tag: String,
    pub kind: String,
    pub error: String,
}

/// What one pass did, or would have done in dry-run mode
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub repositories_scanned: usize,
    pub tags_scanned: usize,
    /// Undeclared repositories whose every tag was removed
    pub deleted_repositories: Vec<String>,
    pub deleted: Vec<DeletedTag>,
    pub skipped: Vec<SkippedTag>,
    pub failures: Vec<FailedTag>,
    /// DELETE requests actually sent
    pub delete_calls: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record_failure(&mut self, repository: &str, tag: &str, error: &RegistryError) {
        self.failures.push(FailedTag {
            repository: repository.to_string(),
            tag: tag.to_string(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        });
    }

    pub(crate) fn record_skip(&mut self, repository: &str, tag: &str, reason: &str) {
        self.skipped.push(SkippedTag {
            repository: repository.to_string(),
            tag: tag.to_string(),
            reason: reason.to_string(),
        });
    }

    /// One line per outcome, for the summary printed at the end of a run
    pub fn summary_lines(&self) -> Vec<String> {
        let verb = if self.dry_run { "would delete" } else { "deleted" };
        let mut lines = Vec::new();

        for deleted in &self.deleted {
            match &deleted.digest {
                Some(digest) => lines.push(format!(
                    "{} {}:{} ({})",
                    verb, deleted.repository, deleted.tag, digest
                )),
                None => lines.push(format!("{} {}:{}", verb, deleted.repository, deleted.tag)),
            }
        }
        for skipped in &self.skipped {
            lines.push(format!(
                "skipped {}:{} ({})",
                skipped.repository, skipped.tag, skipped.reason
            ));
        }
        for failed in &self.failures {
            lines.push(format!(
                "failed {}:{} [{}] {}",
                failed.repository, failed.tag, failed.kind, failed.error
            ));
        }

        lines
    }
}
