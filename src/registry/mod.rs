//! Registry module for Docker registry interactions
//!
//! This module provides token authentication and the client for the Docker
//! Registry HTTP API v2 operations used during reconciliation.

pub mod auth;
pub mod client;
pub mod pagination;
pub mod token_cache;

pub use auth::{BearerToken, Scope, TokenClient};
pub use client::{RegistryClient, RegistryClientBuilder};
pub use token_cache::TokenCache;
