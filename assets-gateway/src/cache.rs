//! Token cache for the cookie-session gate.
//!
//! The cache is the only shared mutable state in the request path.
//! Consistency is at-most-eventual: a race between two requests
//! holding the same fresh token may validate it twice, and a cached
//! identity stays valid until its provider-supplied expiry.

use crate::auth::CallerIdentity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Keyed storage of validated identities.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Look up a still-valid identity for `token`.
    async fn get(&self, token: &str) -> Option<CallerIdentity>;

    /// Store a validated identity for `token`, valid for `ttl`.
    async fn put(&self, token: &str, identity: CallerIdentity, ttl: Duration);
}

struct CachedEntry {
    identity: CallerIdentity,
    expires_at: Instant,
}

/// Process-local token cache.
///
/// Expired entries are evicted lazily when read.
pub struct InMemoryTokenCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, token: &str) -> Option<CallerIdentity> {
        {
            let entries = self.entries.read().await;
            match entries.get(token) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.identity.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // stale entry: drop it under the write lock
        self.entries.write().await.remove(token);
        None
    }

    async fn put(&self, token: &str, identity: CallerIdentity, ttl: Duration) {
        let entry = CachedEntry {
            identity,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(token.to_string(), entry);
    }
}
