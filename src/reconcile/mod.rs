//! Reconciliation of a registry against the desired state
//!
//! A pass has two strictly separated phases. Enumeration lists every
//! repository and its tags into a [`RegistrySnapshot`] and derives a
//! [`ReconcilePlan`] from it. Execution then walks the plan, resolving each
//! planned tag to its manifest digest and deleting by digest. Nothing found
//! after enumeration changes the plan.
//!
//! The registry is only ever shrunk towards the declaration. A tag pushed
//! between enumeration and deletion can still be removed if it is undeclared;
//! no lock is held across the pass.

pub mod plan;
pub mod report;

pub use plan::{DeletionScope, ReconcilePlan, RegistrySnapshot, RepositoryPlan, RepositoryTags};
pub use report::{
    DeletedTag, FailedTag, NoopObserver, ReconcileObserver, ReconcileReport, SkippedTag,
};

use crate::common::RegistryApi;
use crate::desired_state::DesiredState;
use crate::error::RegistryError;
use std::collections::HashSet;
use thiserror::Error;

static NOOP_OBSERVER: NoopObserver = NoopObserver;

/// What to do when resolving or deleting one tag fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure
    #[default]
    Abort,
    /// Record the failure and carry on with the remaining tags
    Continue,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    pub failure_policy: FailurePolicy,
    /// Skip a tag whose manifest is already gone when it is about to be deleted
    pub skip_vanished: bool,
    /// Keep a tag whose digest is also referenced by a retained tag
    pub protect_retained_digests: bool,
}

/// A pass stopped early; `report` holds everything done before the failure
#[derive(Debug, Error)]
#[error("Reconciliation aborted: {source}")]
pub struct ReconcileError {
    #[source]
    pub source: RegistryError,
    pub report: ReconcileReport,
}

impl From<RegistryError> for ReconcileError {
    fn from(source: RegistryError) -> Self {
        Self {
            source,
            report: ReconcileReport::default(),
        }
    }
}

/// A planned tag after digest resolution
struct ResolvedTag {
    tag: String,
    digest: String,
}

pub struct Reconciler<'a, R: RegistryApi + ?Sized> {
    registry: &'a R,
    desired: &'a DesiredState,
    options: ReconcileOptions,
    observer: &'a dyn ReconcileObserver,
}

impl<'a, R: RegistryApi + ?Sized> Reconciler<'a, R> {
    pub fn new(registry: &'a R, desired: &'a DesiredState) -> Self {
        Self {
            registry,
            desired,
            options: ReconcileOptions::default(),
            observer: &NOOP_OBSERVER,
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ReconcileObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Enumerate, plan and execute one full pass
    pub async fn run(&self) -> Result<ReconcileReport, ReconcileError> {
        let snapshot = self.snapshot().await?;
        let plan = self.plan(&snapshot);

        let mut report = ReconcileReport {
            dry_run: self.options.dry_run,
            repositories_scanned: snapshot.repositories.len(),
            tags_scanned: snapshot.tag_count(),
            ..Default::default()
        };

        match self.execute(&plan, &mut report).await {
            Ok(()) => Ok(report),
            Err(source) => Err(ReconcileError { source, report }),
        }
    }

    /// List every repository, then the tags of each
    pub async fn snapshot(&self) -> crate::error::Result<RegistrySnapshot> {
        let names = self.registry.list_repositories().await?;
        let mut repositories = Vec::with_capacity(names.len());

        for name in names {
            let tags = self.registry.list_tags(&name).await?;
            repositories.push(RepositoryTags { name, tags });
        }

        Ok(RegistrySnapshot { repositories })
    }

    pub fn plan(&self, snapshot: &RegistrySnapshot) -> ReconcilePlan {
        ReconcilePlan::compute(snapshot, self.desired)
    }

    /// Carry out `plan`, appending outcomes to `report`
    ///
    /// Returns the error that stopped the pass under [`FailurePolicy::Abort`].
    pub async fn execute(
        &self,
        plan: &ReconcilePlan,
        report: &mut ReconcileReport,
    ) -> Result<(), RegistryError> {
        for repository in &plan.repositories {
            self.execute_repository(repository, report).await?;
        }
        Ok(())
    }

    async fn execute_repository(
        &self,
        plan: &RepositoryPlan,
        report: &mut ReconcileReport,
    ) -> Result<(), RegistryError> {
        let repository = plan.repository.as_str();
        let failures_before = report.failures.len();

        if plan.scope == DeletionScope::Repository {
            self.observer.repository_deletion(repository, &plan.delete);
        }

        if self.options.dry_run {
            for tag in &plan.delete {
                if plan.scope == DeletionScope::Tags {
                    self.observer.tag_deletion(repository, tag);
                }
                report.deleted.push(DeletedTag {
                    repository: repository.to_string(),
                    tag: tag.clone(),
                    digest: None,
                });
            }
            if plan.scope == DeletionScope::Repository {
                report.deleted_repositories.push(repository.to_string());
            }
            return Ok(());
        }

        let protected = if self.options.protect_retained_digests {
            self.retained_digests(plan, report).await?
        } else {
            HashSet::new()
        };

        // Resolve every digest before deleting any: tags sharing a digest
        // disappear together once it is deleted.
        let mut resolved = Vec::with_capacity(plan.delete.len());
        for tag in &plan.delete {
            if plan.scope == DeletionScope::Tags {
                self.observer.tag_deletion(repository, tag);
            }

            match self.registry.resolve_digest(repository, tag).await {
                Ok(digest) => resolved.push(ResolvedTag {
                    tag: tag.clone(),
                    digest,
                }),
                Err(RegistryError::ManifestNotFound { .. }) if self.options.skip_vanished => {
                    let reason = "tag vanished before deletion";
                    self.observer.tag_skipped(repository, tag, reason);
                    report.record_skip(repository, tag, reason);
                }
                Err(err) => self.fail(repository, tag, err, report)?,
            }
        }

        let mut deleted_digests: HashSet<String> = HashSet::new();
        for ResolvedTag { tag, digest } in resolved {
            if protected.contains(&digest) {
                let reason = format!("digest {} is shared with a retained tag", digest);
                self.observer.tag_skipped(repository, &tag, &reason);
                report.record_skip(repository, &tag, &reason);
                continue;
            }

            if !deleted_digests.contains(&digest) {
                if let Err(err) = self.registry.delete_manifest(repository, &digest).await {
                    report.delete_calls += 1;
                    self.fail(repository, &tag, err, report)?;
                    continue;
                }
                report.delete_calls += 1;
                deleted_digests.insert(digest.clone());
            }

            self.observer.manifest_deleted(repository, &tag, &digest);
            report.deleted.push(DeletedTag {
                repository: repository.to_string(),
                tag,
                digest: Some(digest),
            });
        }

        if plan.scope == DeletionScope::Repository && report.failures.len() == failures_before {
            report.deleted_repositories.push(repository.to_string());
        }

        Ok(())
    }

    /// Digests referenced by the tags that stay in this repository
    async fn retained_digests(
        &self,
        plan: &RepositoryPlan,
        report: &mut ReconcileReport,
    ) -> Result<HashSet<String>, RegistryError> {
        let mut digests = HashSet::new();

        for tag in &plan.retain {
            match self.registry.resolve_digest(&plan.repository, tag).await {
                Ok(digest) => {
                    digests.insert(digest);
                }
                // A retained tag that is already gone protects nothing
                Err(RegistryError::ManifestNotFound { .. }) => {}
                Err(err) => self.fail(&plan.repository, tag, err, report)?,
            }
        }

        Ok(digests)
    }

    fn fail(
        &self,
        repository: &str,
        tag: &str,
        err: RegistryError,
        report: &mut ReconcileReport,
    ) -> Result<(), RegistryError> {
        self.observer.failure(repository, tag, &err);
        match self.options.failure_policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::Continue => {
                report.record_failure(repository, tag, &err);
                Ok(())
            }
        }
    }
}
