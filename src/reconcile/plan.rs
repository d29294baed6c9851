//! Diff between a registry snapshot and the desired state

use crate::desired_state::DesiredState;
use serde::Serialize;

/// Tags of one repository as enumerated from the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryTags {
    pub name: String,
    pub tags: Vec<String>,
}

/// Full enumeration result a plan is computed from, in registry order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub repositories: Vec<RepositoryTags>,
}

impl RegistrySnapshot {
    pub fn tag_count(&self) -> usize {
        self.repositories.iter().map(|r| r.tags.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionScope {
    /// The repository is not declared; every tag goes
    Repository,
    /// The repository is declared; only undeclared tags go
    Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryPlan {
    pub repository: String,
    pub scope: DeletionScope,
    pub delete: Vec<String>,
    /// Tags present on the registry that stay
    pub retain: Vec<String>,
}

/// Every deletion one pass will issue
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcilePlan {
    pub repositories: Vec<RepositoryPlan>,
}

impl ReconcilePlan {
    /// Diff `snapshot` against `desired`; declared entries missing from the
    /// registry produce nothing
    pub fn compute(snapshot: &RegistrySnapshot, desired: &DesiredState) -> Self {
        let mut repositories = Vec::new();

        for entry in &snapshot.repositories {
            let plan = match desired.get(&entry.name) {
                None => RepositoryPlan {
                    repository: entry.name.clone(),
                    scope: DeletionScope::Repository,
                    delete: entry.tags.clone(),
                    retain: Vec::new(),
                },
                Some(spec) => {
                    let declared = spec.tag_names();
                    let (retain, delete): (Vec<String>, Vec<String>) = entry
                        .tags
                        .iter()
                        .cloned()
                        .partition(|tag| declared.contains(tag.as_str()));

                    RepositoryPlan {
                        repository: entry.name.clone(),
                        scope: DeletionScope::Tags,
                        delete,
                        retain,
                    }
                }
            };

            if !plan.delete.is_empty() {
                repositories.push(plan);
            }
        }

        Self { repositories }
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn tag_count(&self) -> usize {
        self.repositories.iter().map(|r| r.delete.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired_state::{RepositorySpec, TagSpec, TaggedImage};
    use std::collections::BTreeMap;

    fn snapshot(entries: &[(&str, &[&str])]) -> RegistrySnapshot {
        RegistrySnapshot {
            repositories: entries
                .iter()
                .map(|(name, tags)| RepositoryTags {
                    name: name.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_undeclared_repository_and_extra_tag() {
        let desired: DesiredState = [("app-a", vec!["v1", "v2"])].into_iter().collect();
        let snapshot = snapshot(&[("app-a", &["v1", "v2", "v3"]), ("app-b", &["latest"])]);

        let plan = ReconcilePlan::compute(&snapshot, &desired);
        assert_eq!(plan.repositories.len(), 2);

        let app_a = &plan.repositories[0];
        assert_eq!(app_a.scope, DeletionScope::Tags);
        assert_eq!(app_a.delete, vec!["v3"]);
        assert_eq!(app_a.retain, vec!["v1", "v2"]);

        let app_b = &plan.repositories[1];
        assert_eq!(app_b.scope, DeletionScope::Repository);
        assert_eq!(app_b.delete, vec!["latest"]);
        assert_eq!(plan.tag_count(), 2);
    }

    #[test]
    fn test_structured_tags_match_like_bare_ones() {
        let mut desired = DesiredState::new();
        desired.insert(
            "app",
            RepositorySpec::with_tags([TagSpec::Structured(TaggedImage {
                image_tag: "v1".to_string(),
                metadata: BTreeMap::new(),
            })]),
        );

        let plan = ReconcilePlan::compute(&snapshot(&[("app", &["v1"])]), &desired);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_declaration_deletes_everything() {
        let plan = ReconcilePlan::compute(&snapshot(&[("only", &["t"])]), &DesiredState::new());
        assert_eq!(plan.repositories[0].scope, DeletionScope::Repository);
        assert_eq!(plan.tag_count(), 1);
    }

    #[test]
    fn test_declared_but_missing_is_ignored() {
        let desired: DesiredState = [("ghost", vec!["v1"]), ("app", vec!["v1"])]
            .into_iter()
            .collect();
        let plan = ReconcilePlan::compute(&snapshot(&[("app", &["v1"]), ("empty", &[])]), &desired);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_registry_order_is_preserved() {
        let plan = ReconcilePlan::compute(
            &snapshot(&[("zeta", &["b", "a"]), ("alpha", &["x"])]),
            &DesiredState::new(),
        );
        let names: Vec<_> = plan.repositories.iter().map(|r| r.repository.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(plan.repositories[0].delete, vec!["b", "a"]);
    }
}
