//! Declared repositories and tags
//!
//! The declaration maps repository names to a record with an `image_tags`
//! list. Each entry is either a bare tag name or a record carrying the name in
//! `image_tag` alongside arbitrary metadata:
//!
//! ```yaml
//! app-a:
//!   image_tags:
//!     - v1
//!     - image_tag: v2
//!       pinned_by: release-team
//! app-b: {}
//! ```

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// A declared tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagSpec {
    Bare(String),
    Structured(TaggedImage),
}

/// Record form of a declared tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedImage {
    pub image_tag: String,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl TagSpec {
    /// The tag name this entry declares, whichever form it was written in
    pub fn name(&self) -> &str {
        match self {
            TagSpec::Bare(name) => name,
            TagSpec::Structured(image) => &image.image_tag,
        }
    }
}

impl From<&str> for TagSpec {
    fn from(name: &str) -> Self {
        TagSpec::Bare(name.to_string())
    }
}

impl From<String> for TagSpec {
    fn from(name: String) -> Self {
        TagSpec::Bare(name)
    }
}

/// Declared record for one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySpec {
    #[serde(default)]
    pub image_tags: Vec<TagSpec>,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl RepositorySpec {
    pub fn with_tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagSpec>,
    {
        Self {
            image_tags: tags.into_iter().map(Into::into).collect(),
            metadata: BTreeMap::new(),
        }
    }

    /// Normalized names of every declared tag
    pub fn tag_names(&self) -> HashSet<&str> {
        self.image_tags.iter().map(TagSpec::name).collect()
    }
}

/// Repository name → declared record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState {
    repositories: BTreeMap<String, RepositorySpec>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a YAML (`.yaml`/`.yml`) or JSON declaration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!(
                "Cannot read desired state file {}: {}",
                path.display(),
                e
            ))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        let state = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(RegistryError::Config(format!(
                "Unsupported desired state format '{}': expected .yaml, .yml or .json",
                other
            ))),
        }?;

        Ok(state)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn insert(&mut self, repository: impl Into<String>, spec: RepositorySpec) {
        self.repositories.insert(repository.into(), spec);
    }

    pub fn get(&self, repository: &str) -> Option<&RepositorySpec> {
        self.repositories.get(repository)
    }

    pub fn contains(&self, repository: &str) -> bool {
        self.repositories.contains_key(repository)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RepositorySpec)> {
        self.repositories.iter()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl<K, T> FromIterator<(K, Vec<T>)> for DesiredState
where
    K: Into<String>,
    T: Into<TagSpec>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<T>)>>(iter: I) -> Self {
        let mut state = DesiredState::new();
        for (repository, tags) in iter {
            state.insert(repository, RepositorySpec::with_tags(tags));
        }
        state
    }
}
