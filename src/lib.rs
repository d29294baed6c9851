//! Registry Sync Library
//!
//! Prunes a Docker registry down to a declared set of repositories and tags.
//! The registry client authenticates every call with a token scoped to it,
//! and the reconciler deletes undeclared tags by manifest digest.

pub mod cli;
pub mod common;
pub mod config;
pub mod desired_state;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod registry;

pub use common::RegistryApi;
pub use config::{Credentials, RegistryConfig};
pub use desired_state::{DesiredState, RepositorySpec, TagSpec};
pub use error::{RegistryError, Result};
pub use logging::Logger;
pub use reconcile::{
    FailurePolicy, ReconcileError, ReconcileObserver, ReconcileOptions, ReconcileReport, Reconciler,
};
pub use registry::{RegistryClient, TokenClient};
