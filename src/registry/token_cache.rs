//! Per-scope token reuse within one run
//!
//! Off by default: without a cache every registry call fetches its own token.
//! When enabled, a token is reused for the same scope until its TTL (or the
//! lifetime reported by the token server, whichever is shorter) runs out, or
//! until the registry rejects it with 401.

use crate::registry::auth::{BearerToken, Scope};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CachedToken {
    token: BearerToken,
    expires_at: Instant,
}

/// Thread-safe scope → token cache
#[derive(Clone)]
pub struct TokenCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<Scope, CachedToken>>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached token for `scope`, if one is still valid
    pub fn get(&self, scope: &Scope) -> Option<BearerToken> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard
            .get(scope)
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    pub fn insert(&self, scope: Scope, token: BearerToken) {
        let lifetime = token
            .expires_in()
            .map(|secs| Duration::from_secs(secs).min(self.ttl))
            .unwrap_or(self.ttl);

        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(
            scope,
            CachedToken {
                token,
                expires_at: Instant::now() + lifetime,
            },
        );
    }

    /// Drop the token for `scope`, e.g. after the registry answered 401
    pub fn invalidate(&self, scope: &Scope) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(scope);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
