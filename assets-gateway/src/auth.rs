//! Authentication gates for the assets gateway.
//!
//! One gate is selected at startup from the configured auth mode and
//! held as an immutable `Arc<dyn AuthGate>` for the process lifetime:
//! - [`LocalGate`] — development bypass with a fixed identity
//! - [`CookieGate`] — session cookie, token cache + identity provider
//! - [`BearerGate`] — bearer header, identity provider on every call
//!
//! The unprotected-path predicate ([`is_unprotected`]) is evaluated
//! before any gate runs; exempt requests proceed anonymously.

use crate::cache::TokenCache;
use crate::oidc::TokenVerifier;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use gateway_common::Error;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Authenticated principal attached to one request.
///
/// Constructed fresh per request by the active gate (or the anonymous
/// constructor for unprotected paths); never cached by the router,
/// never mutated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub user_id: String,
    pub groups: Vec<String>,
    pub is_admin: bool,
}

impl CallerIdentity {
    /// Identity used for requests exempted from authentication.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".into(),
            groups: Vec::new(),
            is_admin: false,
        }
    }

    /// Fixed identity returned by the local development gate.
    pub fn local_dev() -> Self {
        Self {
            user_id: "dev@local".into(),
            groups: vec!["dev".into()],
            is_admin: true,
        }
    }
}

/// Error from an authentication gate.
///
/// The two variants are deliberately distinct: callers must be able to
/// tell "you are not allowed" from "we could not check".
#[derive(Debug, Clone, ThisError)]
pub enum AuthError {
    /// Credential absent, malformed, or rejected
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity provider could not be reached
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(msg) => Error::Unauthenticated(msg),
            AuthError::ProviderUnavailable(msg) => Error::IdentityProviderUnavailable(msg),
        }
    }
}

/// Strategy interface validating an inbound credential.
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Validate the request headers into a caller identity.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, AuthError>;
}

/// Paths exempt from authentication, checked before any gate runs.
///
/// Only the health route itself qualifies. Matching must be exact:
/// routed paths like `/assets/{kind}/{raw_id}` carry caller-controlled
/// segments, so any suffix or segment match would let a crafted raw id
/// skip the gate.
pub fn is_unprotected(path: &str) -> bool {
    path == "/healthz"
}

// ============================================================================
// Local bypass
// ============================================================================

/// Development gate: always succeeds with the same fixed identity.
///
/// Only wired in non-deployed profiles.
pub struct LocalGate {
    identity: CallerIdentity,
}

impl LocalGate {
    pub fn new() -> Self {
        Self {
            identity: CallerIdentity::local_dev(),
        }
    }
}

impl Default for LocalGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthGate for LocalGate {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        Ok(self.identity.clone())
    }
}

// ============================================================================
// Cookie session gate
// ============================================================================

/// Session-cookie gate backed by a token cache.
///
/// The cache is consulted first; on a miss the token is validated
/// against the identity provider and cached with the provider-supplied
/// expiry. A race between concurrent requests may validate the same
/// token twice; that is acceptable.
pub struct CookieGate {
    cookie_name: String,
    verifier: Arc<dyn TokenVerifier>,
    cache: Arc<dyn TokenCache>,
    fallback_ttl: Duration,
}

impl CookieGate {
    pub fn new(
        cookie_name: impl Into<String>,
        verifier: Arc<dyn TokenVerifier>,
        cache: Arc<dyn TokenCache>,
        fallback_ttl: Duration,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            verifier,
            cache,
            fallback_ttl,
        }
    }
}

#[async_trait]
impl AuthGate for CookieGate {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        let token = extract_cookie(headers, &self.cookie_name)
            .ok_or_else(|| AuthError::Unauthenticated("missing session cookie".into()))?;

        if let Some(identity) = self.cache.get(&token).await {
            tracing::trace!(user_id = %identity.user_id, "Session cache hit");
            return Ok(identity);
        }

        let verified = self.verifier.verify(&token).await?;
        let ttl = verified
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.fallback_ttl);
        self.cache
            .put(&token, verified.identity.clone(), ttl)
            .await;

        Ok(verified.identity)
    }
}

// ============================================================================
// Bearer token gate
// ============================================================================

/// Bearer gate: validates the token against the provider on every
/// call, no caching.
pub struct BearerGate {
    verifier: Arc<dyn TokenVerifier>,
}

impl BearerGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl AuthGate for BearerGate {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        let token = extract_bearer(headers)
            .ok_or_else(|| AuthError::Unauthenticated("missing bearer token".into()))?;
        let verified = self.verifier.verify(&token).await?;
        Ok(verified.identity)
    }
}

// ============================================================================
// Credential extraction
// ============================================================================

/// Extract a named cookie value from the request headers.
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let raw = value.to_str().ok()?;
        for pair in raw.split(';') {
            if let Some((k, v)) = pair.trim().split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

/// Extract a bearer token from the Authorization header.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
